use std::time::Duration;

/// Runs `op` up to `attempts` times, sleeping `delay` between failures.
/// The last error bubbles out when every attempt fails.
pub fn retry_with_delay<F, T, E>(attempts: usize, delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
{
    assert!(attempts >= 1);
    let mut left = attempts;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(_e) if left > 1 => {
                left -= 1;
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}
