use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// `room_<unix seconds>_<6 alphanumerics>`
pub fn generate_room_id<R: Rng>(rng: &mut R) -> String {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("room_{}_{}", timestamp_ms() / 1000, suffix)
}

/// Random `#rrggbb` colour token
pub fn generate_color<R: Rng>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..0x0100_0000u32))
}
