pub const EVENTS_RECEIVED: &str = "casino_pipeline_events_received";
pub const EVENTS_PUBLISHED: &str = "casino_pipeline_events_published";
pub const EVENTS_DROPPED: &str = "casino_pipeline_events_dropped";
pub const EVENTS_LOGGED: &str = "casino_pipeline_events_logged";
pub const DECODE_ERRORS: &str = "casino_pipeline_decode_errors";
pub const RECV_ERRORS: &str = "casino_pipeline_recv_errors";
pub const PUBLISH_ERRORS: &str = "casino_pipeline_publish_errors";
pub const ENRICH_TIME: &str = "casino_pipeline_enrich_time_seconds";
pub const RATE_CACHE_HITS: &str = "casino_pipeline_rate_cache_hits";
pub const RATE_CACHE_MISSES: &str = "casino_pipeline_rate_cache_misses";
pub const RATE_CACHE_ERRORS: &str = "casino_pipeline_rate_cache_errors";
pub const STATISTICS_QUERIES: &str = "casino_pipeline_statistics_queries";
