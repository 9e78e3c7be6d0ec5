use std::sync::LazyLock;

use prometheus::*;

static METRIC_SIMILAR_SEARCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("pictor_similar_search_duration", "duration of similar search in seconds")
        .unwrap()
});

static METRIC_MODEL_LOAD_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("pictor_model_load_count", "count of model resource loads").unwrap()
});

static METRIC_MODEL_UNLOAD_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("pictor_model_unload_count", "count of idle model unloads").unwrap()
});

static METRIC_BACKFILL_RESULT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "pictor_backfill_result",
        "per-record outcome of embedding backfill",
        &["result"]
    )
    .unwrap()
});

pub fn observe_similar_search_duration(seconds: f64) {
    METRIC_SIMILAR_SEARCH_DURATION.observe(seconds);
}

pub fn inc_model_load() {
    METRIC_MODEL_LOAD_COUNT.inc();
}

pub fn inc_model_unload() {
    METRIC_MODEL_UNLOAD_COUNT.inc();
}

pub fn add_backfill_result(result: &str, count: u64) {
    METRIC_BACKFILL_RESULT.with_label_values(&[result]).inc_by(count);
}
