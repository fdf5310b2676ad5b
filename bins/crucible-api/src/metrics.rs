use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

lazy_static! {
    pub static ref SUBMISSIONS_RECEIVED: IntCounter = register_int_counter!(
        "crucible_submissions_received_total",
        "Submissions accepted by the intake API"
    )
    .expect("metric registration");
}

pub fn render() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
