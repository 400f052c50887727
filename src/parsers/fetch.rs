// src/parsers/fetch.rs

use rand::Rng;
use reqwest::blocking::Client;
use std::error::Error;
use std::fmt;
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// Server-side transient statuses worth retrying; anything else non-2xx is a
// hard failure for this source.
const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

#[cfg(not(test))]
const BACKOFF_UNIT: Duration = Duration::from_secs(1);
#[cfg(test)]
const BACKOFF_UNIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub enum FetchError {
    Transport(String),
    HttpStatus(u16),
    RetriesExhausted(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "Transport error: {msg}"),
            FetchError::HttpStatus(status) => write!(f, "Unexpected HTTP status: {status}"),
            FetchError::RetriesExhausted(status) => {
                write!(f, "Retries exhausted, last HTTP status: {status}")
            }
        }
    }
}

impl Error for FetchError {}

/// One outbound request, as the parser defines it.
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub params: Vec<(&'static str, String)>,
}

/// Minimal HTTP contract the fetch layer needs; lets tests swap in a scripted
/// transport.
pub trait Transport {
    fn get(&self, request: &FetchRequest) -> Result<(u16, Vec<u8>), FetchError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, request: &FetchRequest) -> Result<(u16, Vec<u8>), FetchError> {
        let mut req = self.client.get(&request.url);
        for (name, value) in &request.headers {
            req = req.header(*name, value);
        }
        let resp = req
            .query(&request.params)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_vec();
        Ok((status, body))
    }
}

/// Fetches a source payload, retrying transient server errors with randomized
/// exponential backoff (sleep uniform in [0, 2^retries) seconds) up to
/// `max_attempts` total attempts.
pub fn fetch_with_retry(
    transport: &dyn Transport,
    request: &FetchRequest,
    max_attempts: u32,
) -> Result<Vec<u8>, FetchError> {
    let mut retries: u32 = 0;
    loop {
        if retries > 0 {
            eprintln!("Attempting retry on specials request: {retries}");
            let ceiling = 2u64.pow(retries.min(6));
            let wait = rand::thread_rng().gen_range(0..ceiling * 1000);
            std::thread::sleep(BACKOFF_UNIT.mul_f64(wait as f64 / 1000.0));
        }

        let (status, body) = transport.get(request)?;
        if RETRYABLE_STATUSES.contains(&status) {
            retries += 1;
            if retries >= max_attempts {
                return Err(FetchError::RetriesExhausted(status));
            }
        } else if !(200..300).contains(&status) {
            return Err(FetchError::HttpStatus(status));
        } else {
            return Ok(body);
        }
    }
}
