// Upload, download and compare random objects against a running server
use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, Command};
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct LoadClient {
    client: reqwest::Client,
    base_url: String,
}

impl LoadClient {
    fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn file_url(&self) -> String {
        format!("{}/api/v1/file", self.base_url)
    }

    async fn upload(&self, name: &str, data: Vec<u8>) -> Result<()> {
        let started = Instant::now();
        let size = data.len();

        let response = self
            .client
            .post(self.file_url())
            .query(&[("filename", name)])
            .body(data)
            .send()
            .await
            .with_context(|| format!("uploading {}", name))?;

        let status = response.status();
        if !status.is_success() {
            bail!("upload of {} failed with {}: {}", name, status, response.text().await?);
        }

        info!("Uploaded {} ({} bytes) in {:?}", name, size, started.elapsed());
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>> {
        let started = Instant::now();

        let response = self
            .client
            .get(self.file_url())
            .query(&[("filename", name)])
            .send()
            .await
            .with_context(|| format!("downloading {}", name))?;

        let status = response.status();
        if !status.is_success() {
            bail!("download of {} failed with {}: {}", name, status, response.text().await?);
        }

        let data = response.bytes().await?.to_vec();
        info!("Downloaded {} ({} bytes) in {:?}", name, data.len(), started.elapsed());
        Ok(data)
    }

    async fn stats(&self) -> Result<serde_json::Value> {
        let stats = self
            .client
            .get(format!("{}/api/v1/stats", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(stats)
    }

    async fn round_trip(&self, name: &str, data: &[u8]) -> Result<()> {
        self.upload(name, data.to_vec()).await?;
        let downloaded = self.download(name).await?;

        if downloaded != data {
            bail!("{} came back different: sent {} bytes, got {}", name, data.len(), downloaded.len());
        }

        info!("{} round trip verified", name);
        Ok(())
    }
}

fn random_payload(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill(&mut data[..]);
    data
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = Command::new("load-client")
        .about("Round-trips random objects through a shardstore server")
        .arg(
            Arg::new("url")
                .long("url")
                .env("SHARDSTORE_URL")
                .default_value("http://127.0.0.1:8080"),
        )
        .arg(
            Arg::new("size")
                .long("size")
                .help("Object size in bytes")
                .value_parser(value_parser!(usize))
                .default_value("10485760"),
        )
        .arg(
            Arg::new("wait")
                .long("wait")
                .help("Seconds to wait between the two uploads")
                .value_parser(value_parser!(u64))
                .default_value("60"),
        )
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .default_value("testfile"),
        )
        .get_matches();

    let url = matches.get_one::<String>("url").context("missing url")?;
    let size = *matches.get_one::<usize>("size").context("missing size")?;
    let wait = *matches.get_one::<u64>("wait").context("missing wait")?;
    let prefix = matches.get_one::<String>("prefix").context("missing prefix")?;

    // names are permanent, so every run picks fresh ones
    let run_id: u32 = rand::thread_rng().gen();
    let first = format!("{}-{:08x}", prefix, run_id);
    let second = format!("{}-{:08x}-2", prefix, run_id);

    let client = LoadClient::new(url);
    let data = random_payload(size);

    client.round_trip(&first, &data).await?;
    info!("Node stats: {}", client.stats().await?);

    if wait > 0 {
        info!("Waiting {}s before the second upload", wait);
        sleep(Duration::from_secs(wait)).await;
    }

    client.round_trip(&second, &data).await?;
    info!("Node stats: {}", client.stats().await?);

    // the first object must still read back intact after the pool changed
    if client.download(&first).await? != data {
        bail!("{} changed after the second upload", first);
    }

    info!("Load client finished");
    Ok(())
}
