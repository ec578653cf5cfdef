use async_trait::async_trait;
use etl_types::entities::Item;

use crate::error::SinkError;

/// Any consumer of items: a CSV file writer, a relational upsert writer, or
/// (in tests) a recording fake (§4.8, GLOSSARY).
///
/// `open`/`close`/`export_items` are the only operations the multi-exporter
/// broadcasts; idempotence under repeated `export_items` calls for the same
/// logical rows is each sink's own responsibility (§4.8).
#[async_trait]
pub trait Sink: Send + Sync {
    /// Prepares the sink to receive items for a new partition (e.g. opens
    /// files, acquires a connection).
    async fn open(&mut self) -> Result<(), SinkError>;

    /// Writes a batch of items, which may span multiple item types.
    async fn export_items(&mut self, items: &[Item]) -> Result<(), SinkError>;

    /// Flushes and releases any resources acquired by `open`.
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// Fans every call out to a fixed list of sinks, in the order they were
/// given, stopping at the first failure (§4.8).
///
/// Constructed from `Vec<Box<dyn Sink>>` rather than `Vec<Option<Box<dyn
/// Sink>>>`: the distilled spec filters null sink entries out before
/// construction, which in Rust is simply "don't push it onto the `Vec`" at
/// the call site (`etl_cli`'s config wiring).
pub struct MultiExporter {
    sinks: Vec<Box<dyn Sink>>,
}

impl MultiExporter {
    /// Creates a multi-exporter broadcasting to `sinks` in declared order.
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        MultiExporter { sinks }
    }

    /// Whether no sinks are configured at all (a legal, no-op partition
    /// run used by tests and dry-run CLI invocations).
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Sink for MultiExporter {
    async fn open(&mut self) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.open().await?;
        }
        Ok(())
    }

    async fn export_items(&mut self, items: &[Item]) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.export_items(items).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use etl_types::entities::{Block, Item};

    use super::*;

    struct RecordingSink {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_on_open: bool,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn open(&mut self) -> Result<(), SinkError> {
            if self.fail_on_open {
                let source = std::io::Error::new(std::io::ErrorKind::Other, "boom");
                return Err(SinkError::Open {
                    sink: self.name,
                    source: source.into(),
                });
            }
            self.log.lock().unwrap().push(format!("{}:open", self.name));
            Ok(())
        }

        async fn export_items(&mut self, items: &[Item]) -> Result<(), SinkError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:export:{}", self.name, items.len()));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            self.log.lock().unwrap().push(format!("{}:close", self.name));
            Ok(())
        }
    }

    fn sample_item() -> Item {
        Item::Block(Block {
            number: 1,
            hash: "0xaa".to_string(),
            parent_hash: "0x0".to_string(),
            nonce: None,
            sha3_uncles: "0x0".to_string(),
            logs_bloom: None,
            transactions_root: "0x0".to_string(),
            state_root: "0x0".to_string(),
            receipts_root: "0x0".to_string(),
            miner: None,
            difficulty: None,
            total_difficulty: None,
            size: None,
            extra_data: "0x".to_string(),
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            transaction_count: 0,
            base_fee_per_gas: None,
        })
    }

    #[tokio::test]
    async fn broadcasts_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut exporter = MultiExporter::new(vec![
            Box::new(RecordingSink {
                name: "csv",
                log: log.clone(),
                fail_on_open: false,
            }),
            Box::new(RecordingSink {
                name: "upsert",
                log: log.clone(),
                fail_on_open: false,
            }),
        ]);

        exporter.open().await.unwrap();
        exporter.export_items(&[sample_item()]).await.unwrap();
        exporter.close().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "csv:open".to_string(),
                "upsert:open".to_string(),
                "csv:export:1".to_string(),
                "upsert:export:1".to_string(),
                "csv:close".to_string(),
                "upsert:close".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn a_sink_failure_is_fatal_and_stops_the_broadcast() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut exporter = MultiExporter::new(vec![
            Box::new(RecordingSink {
                name: "csv",
                log: log.clone(),
                fail_on_open: true,
            }),
            Box::new(RecordingSink {
                name: "upsert",
                log: log.clone(),
                fail_on_open: false,
            }),
        ]);

        let result = exporter.open().await;
        assert!(result.is_err());
        assert!(log.lock().unwrap().is_empty());
    }
}
