use std::sync::Arc;

use keyscope_core::{
    DbError, DeleteMembersRequest, HashField, MemberSource, PageRequest, PagedSlice,
    PaginationKind, ScanCursor, SearchRequest, SortDirection, UpdateMembersRequest, ZSetMember,
    is_glob_pattern, unescape_glob,
};

use crate::driver::{RedisConnection, format_redis_query_error};

/// Runs one `ZSCAN`/`HSCAN` step from `cursor` and pairs up the flat reply.
fn scan_step(
    conn: &mut redis::Connection,
    command: &str,
    request: &SearchRequest,
    cursor: ScanCursor,
) -> Result<(ScanCursor, Vec<(String, String)>), DbError> {
    let (next, flat): (u64, Vec<String>) = redis::cmd(command)
        .arg(&request.key_name)
        .arg(cursor.0)
        .arg("MATCH")
        .arg(&request.pattern)
        .arg("COUNT")
        .arg(request.limit.max(1))
        .query(conn)
        .map_err(|e| format_redis_query_error(&e))?;

    Ok((ScanCursor(next), pair_up(flat)))
}

/// Repeats [`scan_step`] until `limit` pairs matched or the cursor is back at 0.
/// A single step may match nothing while later steps still would.
fn scan_matches(
    conn: &mut redis::Connection,
    command: &str,
    request: &SearchRequest,
) -> Result<(ScanCursor, Vec<(String, String)>), DbError> {
    let wanted = request.limit as usize;
    let mut cursor = request.cursor;
    let mut pairs = Vec::new();
    let mut steps = 0usize;

    loop {
        let (next, found) = scan_step(conn, command, request, cursor)?;
        pairs.extend(found);
        cursor = next;
        steps += 1;

        if cursor.is_exhausted() || pairs.len() >= wanted {
            break;
        }
    }

    log::debug!(
        "{} {} '{}': {} match(es) in {} step(s)",
        command,
        request.key_name,
        request.pattern,
        pairs.len(),
        steps
    );

    Ok((cursor, pairs))
}

/// `[a, 1, b, 2]` into `[(a, 1), (b, 2)]`; a dangling last item is dropped.
pub(crate) fn pair_up(flat: Vec<String>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(flat.len() / 2);
    let mut items = flat.into_iter();

    while let (Some(first), Some(second)) = (items.next(), items.next()) {
        pairs.push((first, second));
    }

    pairs
}

pub(crate) fn parse_score(raw: &str) -> Result<f64, DbError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DbError::query_failed(format!("Invalid score '{}'", raw)))
}

fn length(conn: &mut redis::Connection, command: &str, key: &str) -> Result<u64, DbError> {
    redis::cmd(command)
        .arg(key)
        .query::<u64>(conn)
        .map_err(|e| format_redis_query_error(&e))
}

// --- Sorted set ---

/// Members of a sorted set, paged by rank.
#[derive(Clone)]
pub struct RedisZSetSource {
    connection: Arc<RedisConnection>,
}

impl RedisZSetSource {
    pub fn new(connection: Arc<RedisConnection>) -> Self {
        Self { connection }
    }
}

impl MemberSource for RedisZSetSource {
    type Member = ZSetMember;

    fn fetch_page(&self, request: &PageRequest) -> Result<PagedSlice<ZSetMember>, DbError> {
        self.connection.with_connection(|conn| {
            let total = length(conn, "ZCARD", &request.key_name)?;
            if request.limit == 0 || request.offset >= total {
                return Ok(PagedSlice::new(total, ScanCursor::START, Vec::new()));
            }

            let command = match request.sort.order {
                SortDirection::Ascending => "ZRANGE",
                SortDirection::Descending => "ZREVRANGE",
            };
            let stop = request.offset + u64::from(request.limit) - 1;

            let flat: Vec<String> = redis::cmd(command)
                .arg(&request.key_name)
                .arg(request.offset)
                .arg(stop)
                .arg("WITHSCORES")
                .query(conn)
                .map_err(|e| format_redis_query_error(&e))?;

            let members = pair_up(flat)
                .into_iter()
                .map(|(name, score)| Ok(ZSetMember::new(name, parse_score(&score)?)))
                .collect::<Result<Vec<_>, DbError>>()?;

            Ok(PagedSlice::new(total, ScanCursor::START, members))
        })
    }

    fn fetch_search_page(&self, request: &SearchRequest) -> Result<PagedSlice<ZSetMember>, DbError> {
        self.connection.with_connection(|conn| {
            let total = length(conn, "ZCARD", &request.key_name)?;

            if !is_glob_pattern(&request.pattern) {
                let name = unescape_glob(&request.pattern);
                let score: Option<String> = redis::cmd("ZSCORE")
                    .arg(&request.key_name)
                    .arg(&name)
                    .query(conn)
                    .map_err(|e| format_redis_query_error(&e))?;

                let members = match score {
                    Some(score) => vec![ZSetMember::new(name, parse_score(&score)?)],
                    None => Vec::new(),
                };
                return Ok(PagedSlice::new(total, ScanCursor::START, members));
            }

            let (next, pairs) = scan_matches(conn, "ZSCAN", request)?;
            let members = pairs
                .into_iter()
                .map(|(name, score)| Ok(ZSetMember::new(name, parse_score(&score)?)))
                .collect::<Result<Vec<_>, DbError>>()?;

            Ok(PagedSlice::new(total, next, members))
        })
    }

    fn update_members(&self, request: &UpdateMembersRequest<ZSetMember>) -> Result<(), DbError> {
        if request.members.is_empty() {
            return Ok(());
        }

        self.connection.with_connection(|conn| {
            let mut command = redis::cmd("ZADD");
            command.arg(&request.key_name);
            for member in &request.members {
                command.arg(member.score).arg(&member.name);
            }

            command
                .query::<u64>(conn)
                .map_err(|e| format_redis_query_error(&e))?;
            Ok(())
        })
    }

    fn delete_members(&self, request: &DeleteMembersRequest) -> Result<u64, DbError> {
        if request.member_keys.is_empty() {
            return Ok(0);
        }

        self.connection.with_connection(|conn| {
            redis::cmd("ZREM")
                .arg(&request.key_name)
                .arg(&request.member_keys)
                .query::<u64>(conn)
                .map_err(|e| format_redis_query_error(&e))
        })
    }
}

// --- Hash ---

/// Fields of a hash. Hashes have no ranks, so every page is an `HSCAN` step.
#[derive(Clone)]
pub struct RedisHashSource {
    connection: Arc<RedisConnection>,
}

impl RedisHashSource {
    pub fn new(connection: Arc<RedisConnection>) -> Self {
        Self { connection }
    }
}

impl MemberSource for RedisHashSource {
    type Member = HashField;

    fn pagination(&self) -> PaginationKind {
        PaginationKind::Cursor
    }

    fn fetch_page(&self, _request: &PageRequest) -> Result<PagedSlice<HashField>, DbError> {
        Err(DbError::NotSupported(
            "hash fields are only reachable by cursor".to_string(),
        ))
    }

    fn fetch_search_page(&self, request: &SearchRequest) -> Result<PagedSlice<HashField>, DbError> {
        self.connection.with_connection(|conn| {
            let total = length(conn, "HLEN", &request.key_name)?;

            if !is_glob_pattern(&request.pattern) {
                let field = unescape_glob(&request.pattern);
                let value: Option<String> = redis::cmd("HGET")
                    .arg(&request.key_name)
                    .arg(&field)
                    .query(conn)
                    .map_err(|e| format_redis_query_error(&e))?;

                let fields = value
                    .map(|value| vec![HashField::new(field, value)])
                    .unwrap_or_default();
                return Ok(PagedSlice::new(total, ScanCursor::START, fields));
            }

            let (next, pairs) = scan_matches(conn, "HSCAN", request)?;
            let fields = pairs
                .into_iter()
                .map(|(field, value)| HashField::new(field, value))
                .collect();

            Ok(PagedSlice::new(total, next, fields))
        })
    }

    fn update_members(&self, request: &UpdateMembersRequest<HashField>) -> Result<(), DbError> {
        if request.members.is_empty() {
            return Ok(());
        }

        self.connection.with_connection(|conn| {
            let mut command = redis::cmd("HSET");
            command.arg(&request.key_name);
            for field in &request.members {
                command.arg(&field.field).arg(&field.value);
            }

            command
                .query::<u64>(conn)
                .map_err(|e| format_redis_query_error(&e))?;
            Ok(())
        })
    }

    fn delete_members(&self, request: &DeleteMembersRequest) -> Result<u64, DbError> {
        if request.member_keys.is_empty() {
            return Ok(0);
        }

        self.connection.with_connection(|conn| {
            redis::cmd("HDEL")
                .arg(&request.key_name)
                .arg(&request.member_keys)
                .query::<u64>(conn)
                .map_err(|e| format_redis_query_error(&e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_replies_pair_up() {
        let flat = vec!["a", "1", "b", "2.5", "dangling"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(
            pair_up(flat),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2.5".to_string()),
            ]
        );
    }

    #[test]
    fn scores_accept_redis_infinities() -> Result<(), DbError> {
        assert_eq!(parse_score("1.5")?, 1.5);
        assert_eq!(parse_score("-inf")?, f64::NEG_INFINITY);
        assert_eq!(parse_score("+inf")?, f64::INFINITY);
        assert!(parse_score("abc").is_err());
        Ok(())
    }
}
