use std::collections::HashMap;
use std::sync::Arc;

use keyscope_core::{
    ClaimOutcome, ClaimRequest, Consumer, ConsumerGroup, DbError, IdleTimeFormat, PendingMessage,
    PendingRequest, StreamApi, StreamEntryId,
};
use redis::FromRedisValue;

use crate::driver::{RedisConnection, format_redis_query_error};

type InfoEntry = HashMap<String, redis::Value>;

/// Consumer groups of stream keys, through `XINFO`, `XPENDING` and `XCLAIM`.
#[derive(Clone)]
pub struct RedisStreamApi {
    connection: Arc<RedisConnection>,
}

impl RedisStreamApi {
    pub fn new(connection: Arc<RedisConnection>) -> Self {
        Self { connection }
    }
}

fn info_field<T: FromRedisValue>(entry: &InfoEntry, name: &str) -> Result<T, DbError> {
    let value = entry
        .get(name)
        .ok_or_else(|| DbError::query_failed(format!("XINFO reply is missing '{}'", name)))?;

    redis::from_redis_value(value).map_err(|e| format_redis_query_error(&e))
}

fn parse_entry_id(raw: &str) -> Result<StreamEntryId, DbError> {
    raw.parse::<StreamEntryId>()
        .map_err(|e| DbError::query_failed(format!("Invalid entry id '{}': {}", raw, e)))
}

/// Arguments of `XCLAIM` after the command name. Always `JUSTID`.
pub(crate) fn claim_args(request: &ClaimRequest) -> Vec<String> {
    let mut args = vec![
        request.key_name.clone(),
        request.group_name.clone(),
        request.consumer_name.clone(),
        request.min_idle_time.to_string(),
    ];
    args.extend(request.entries.iter().map(StreamEntryId::to_string));

    if let Some(idle) = request.idle {
        let keyword = match request.time_format {
            IdleTimeFormat::RelativeTime => "IDLE",
            IdleTimeFormat::Timestamp => "TIME",
        };
        args.push(keyword.to_string());
        args.push(idle.to_string());
    }

    if let Some(retry_count) = request.retry_count {
        args.push("RETRYCOUNT".to_string());
        args.push(retry_count.to_string());
    }

    if request.force {
        args.push("FORCE".to_string());
    }

    args.push("JUSTID".to_string());
    args
}

impl StreamApi for RedisStreamApi {
    fn groups(&self, key_name: &str) -> Result<Vec<ConsumerGroup>, DbError> {
        self.connection.with_connection(|conn| {
            let entries: Vec<InfoEntry> = redis::cmd("XINFO")
                .arg("GROUPS")
                .arg(key_name)
                .query(conn)
                .map_err(|e| format_redis_query_error(&e))?;

            entries
                .iter()
                .map(|entry| {
                    Ok(ConsumerGroup {
                        name: info_field(entry, "name")?,
                        consumers: info_field(entry, "consumers")?,
                        pending: info_field(entry, "pending")?,
                        last_delivered_id: info_field(entry, "last-delivered-id")?,
                    })
                })
                .collect()
        })
    }

    fn consumers(&self, key_name: &str, group_name: &str) -> Result<Vec<Consumer>, DbError> {
        self.connection.with_connection(|conn| {
            let entries: Vec<InfoEntry> = redis::cmd("XINFO")
                .arg("CONSUMERS")
                .arg(key_name)
                .arg(group_name)
                .query(conn)
                .map_err(|e| format_redis_query_error(&e))?;

            entries
                .iter()
                .map(|entry| {
                    Ok(Consumer {
                        name: info_field(entry, "name")?,
                        pending: info_field(entry, "pending")?,
                        idle_ms: info_field(entry, "idle")?,
                    })
                })
                .collect()
        })
    }

    fn pending(&self, request: &PendingRequest) -> Result<Vec<PendingMessage>, DbError> {
        self.connection.with_connection(|conn| {
            let rows: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
                .arg(&request.key_name)
                .arg(&request.group_name)
                .arg("-")
                .arg("+")
                .arg(request.count)
                .arg(&request.consumer_name)
                .query(conn)
                .map_err(|e| format_redis_query_error(&e))?;

            rows.into_iter()
                .map(|(id, consumer, idle_ms, delivered_count)| {
                    Ok(PendingMessage {
                        id: parse_entry_id(&id)?,
                        consumer,
                        idle_ms,
                        delivered_count,
                    })
                })
                .collect()
        })
    }

    fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome, DbError> {
        request
            .validate()
            .map_err(|e| DbError::query_failed(e.to_string()))?;

        self.connection.with_connection(|conn| {
            let ids: Vec<String> = redis::cmd("XCLAIM")
                .arg(claim_args(request))
                .query(conn)
                .map_err(|e| format_redis_query_error(&e))?;

            log::debug!(
                "XCLAIM {} moved {} of {} entries to {}",
                request.key_name,
                ids.len(),
                request.entries.len(),
                request.consumer_name
            );

            let affected = ids
                .iter()
                .map(|id| parse_entry_id(id))
                .collect::<Result<Vec<_>, DbError>>()?;

            Ok(ClaimOutcome { affected })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ClaimRequest {
        ClaimRequest::new(
            "orders",
            "billing",
            "worker-2",
            3600000,
            vec![StreamEntryId::new(1700000000000, 0), StreamEntryId::new(1700000000000, 1)],
        )
    }

    #[test]
    fn claim_args_default_to_justid_only() {
        assert_eq!(
            claim_args(&request()),
            vec![
                "orders",
                "billing",
                "worker-2",
                "3600000",
                "1700000000000-0",
                "1700000000000-1",
                "JUSTID",
            ]
        );
    }

    #[test]
    fn claim_args_carry_optional_parameters() {
        let args = claim_args(
            &request()
                .with_idle(1700000000000, IdleTimeFormat::Timestamp)
                .with_retry_count(4)
                .forced(),
        );

        assert_eq!(
            &args[6..],
            &["TIME", "1700000000000", "RETRYCOUNT", "4", "FORCE", "JUSTID"]
        );

        let relative = claim_args(&request().with_idle(500, IdleTimeFormat::RelativeTime));
        assert_eq!(&relative[6..], &["IDLE", "500", "JUSTID"]);
    }

    #[test]
    fn info_fields_are_typed() -> Result<(), DbError> {
        let mut entry = InfoEntry::new();
        entry.insert("name".to_string(), redis::Value::BulkString(b"billing".to_vec()));
        entry.insert("pending".to_string(), redis::Value::Int(3));

        let name: String = info_field(&entry, "name")?;
        let pending: u64 = info_field(&entry, "pending")?;

        assert_eq!(name, "billing");
        assert_eq!(pending, 3);
        assert!(info_field::<u64>(&entry, "consumers").is_err());
        Ok(())
    }
}
