use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use agora::application::entities::{CreateTheme, ThemeService, UpdateTheme};
use agora::cache::MemoryCache;
use agora::infra::memory::MemoryStore;
use agora::infra::telemetry;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(MemoryCache::new(
        NonZeroUsize::new(1).expect("non-zero capacity"),
    ));
    let themes = ThemeService::new(store, cache, Duration::from_secs(60));

    let mut ids = Vec::new();
    for nombre in ["Agua", "Energía"] {
        let theme = themes
            .create(CreateTheme {
                nombre: nombre.to_string(),
                descripcion: None,
            })
            .await
            .expect("created");
        ids.push(theme.id);
    }

    // miss + fill, hit, then a second fill evicts the first entry
    themes.get_by_id(&ids[0]).await.expect("miss");
    themes.get_by_id(&ids[0]).await.expect("hit");
    themes.get_by_id(&ids[1]).await.expect("miss and evict");
    themes
        .update(
            &ids[1],
            UpdateTheme {
                descripcion: Some(Some("renovables".to_string())),
                ..Default::default()
            },
        )
        .await
        .expect("updated");

    let counters: HashMap<String, u64> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| {
            let key = composite_key.key();
            let labelled_tema = key
                .labels()
                .any(|label| label.key() == "entity" && label.value() == "tema");
            match value {
                DebugValue::Counter(count) if labelled_tema => {
                    Some((key.name().to_string(), count))
                }
                _ => None,
            }
        })
        .collect();

    assert_eq!(counters.get("agora_cache_hit_total"), Some(&1));
    assert_eq!(counters.get("agora_cache_miss_total"), Some(&2));
    assert_eq!(counters.get("agora_cache_evict_total"), Some(&1));
    assert_eq!(counters.get("agora_cache_invalidate_total"), Some(&1));
}
