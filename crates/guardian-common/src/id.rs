use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Pins the generator to this server's `(machine_id, node_id)` pair
/// from the config. Ids key alerts, stored events, queue items and
/// dead letters; two servers writing the same database need distinct
/// pairs to keep them from colliding.
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap();
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// A fresh snowflake id in string form. Self-initializes with the
/// `(1, 1)` identity when `init` was never called, so store-level code
/// works without server startup.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap();
    let bucket = gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}
