use std::time::{Duration, Instant};
use testcontainers::GenericImage;
use testcontainers::clients::Cli;
use testcontainers::core::WaitFor;

/// Runs `run` against a throwaway Redis 7 container.
pub fn with_redis_url<T, E, F>(run: F) -> Result<T, E>
where
    F: FnOnce(String) -> Result<T, E>,
{
    let docker = Cli::default();
    let image = GenericImage::new("redis", "7")
        .with_exposed_port(6379)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

    let container = docker.run(image);
    let port = container.get_host_port_ipv4(6379);
    let url = format!("redis://127.0.0.1:{port}/0");

    run(url)
}

/// Retries `operation` every 250ms until it succeeds or `timeout` elapses.
pub fn retry_db_operation<T, F>(
    timeout: Duration,
    mut operation: F,
) -> Result<T, keyscope_core::DbError>
where
    F: FnMut() -> Result<T, keyscope_core::DbError>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) => {
                if Instant::now() >= deadline {
                    return Err(error);
                }
                log::debug!("retrying after: {}", error);
            }
        }

        std::thread::sleep(Duration::from_millis(250));
    }
}
