use std::sync::Mutex;

use keyscope_core::{DbError, KeyInfo, KeyType};

/// Where and how to reach a Redis server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisProfile {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<u32>,
    /// Connect with this URI verbatim instead of the fields above.
    pub uri: Option<String>,
}

impl Default for RedisProfile {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            tls: false,
            user: None,
            password: None,
            database: None,
            uri: None,
        }
    }
}

impl RedisProfile {
    /// Splits a `redis://` or `rediss://` URI into profile fields.
    ///
    /// The original URI is kept so connecting uses it unchanged.
    pub fn from_uri(uri: &str) -> Result<Self, DbError> {
        let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
            DbError::InvalidProfile(format!("Not a Redis URI: {}", sanitize_uri(uri)))
        })?;

        let tls = match scheme {
            "redis" => false,
            "rediss" => true,
            other => {
                return Err(DbError::InvalidProfile(format!(
                    "Unsupported scheme '{}'",
                    other
                )));
            }
        };

        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let (credentials, host_port) = match authority.rsplit_once('@') {
            Some((credentials, host_port)) => (Some(credentials), host_port),
            None => (None, authority),
        };

        let (user, password) = match credentials {
            Some(credentials) => match credentials.split_once(':') {
                Some((user, password)) => (decode_part(user), decode_part(password)),
                None => (decode_part(credentials), None),
            },
            None => (None, None),
        };

        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| DbError::InvalidProfile(format!("Invalid port '{}'", port)))?;
                (host.to_string(), port)
            }
            None => (host_port.to_string(), 6379),
        };

        let database = path.trim_matches('/');
        let database = if database.is_empty() {
            None
        } else {
            Some(database.parse::<u32>().map_err(|_| {
                DbError::InvalidProfile(format!("Invalid database index '{}'", database))
            })?)
        };

        Ok(Self {
            host: if host.is_empty() { "127.0.0.1".to_string() } else { host },
            port,
            tls,
            user,
            password,
            database,
            uri: Some(uri.to_string()),
        })
    }

    /// Builds a connection URI from the individual fields.
    pub fn to_uri(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let user = self.user.as_deref().unwrap_or("");
        let password = self.password.as_deref().unwrap_or("");

        let auth = if !user.is_empty() {
            if password.is_empty() {
                format!("{}@", urlencoding::encode(user))
            } else {
                format!(
                    "{}:{}@",
                    urlencoding::encode(user),
                    urlencoding::encode(password)
                )
            }
        } else if !password.is_empty() {
            format!(":{}@", urlencoding::encode(password))
        } else {
            String::new()
        };

        let path = match self.database {
            Some(db) => format!("/{}", db),
            None => String::new(),
        };

        format!("{}://{}{}:{}{}", scheme, auth, self.host, self.port, path)
    }
}

fn decode_part(part: &str) -> Option<String> {
    if part.is_empty() {
        return None;
    }

    Some(
        urlencoding::decode(part)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| part.to_string()),
    )
}

pub struct RedisDriver;

impl RedisDriver {
    pub fn new() -> Self {
        Self
    }

    pub fn connect(&self, profile: &RedisProfile) -> Result<RedisConnection, DbError> {
        match profile.uri.as_deref() {
            Some(uri) => self.connect_with_uri(
                uri,
                profile.user.as_deref(),
                profile.password.as_deref(),
                profile.database,
            ),
            None => self.connect_direct(profile),
        }
    }

    fn connect_direct(&self, profile: &RedisProfile) -> Result<RedisConnection, DbError> {
        let scheme = if profile.tls { "rediss" } else { "redis" };
        let uri = format!("{}://{}:{}/", scheme, profile.host, profile.port);
        let host = profile.host.as_str();
        let port = profile.port;

        let client =
            redis::Client::open(uri.as_str()).map_err(|e| format_redis_error(&e, host, port))?;
        let mut connection = client
            .get_connection()
            .map_err(|e| format_redis_error(&e, host, port))?;

        authenticate(
            &mut connection,
            profile.user.as_deref(),
            profile.password.as_deref(),
        )
        .map_err(|e| format_redis_error(&e, host, port))?;

        if let Some(db) = profile.database {
            select_db(&mut connection, db).map_err(|e| format_redis_error(&e, host, port))?;
        }

        redis::cmd("PING")
            .query::<String>(&mut connection)
            .map_err(|e| format_redis_error(&e, host, port))?;

        log::info!("Connected to Redis at {}:{}", host, port);

        Ok(RedisConnection {
            connection: Mutex::new(connection),
        })
    }

    fn connect_with_uri(
        &self,
        uri: &str,
        user: Option<&str>,
        password: Option<&str>,
        database: Option<u32>,
    ) -> Result<RedisConnection, DbError> {
        let client = redis::Client::open(uri).map_err(|e| format_redis_uri_error(&e, uri))?;
        let mut connection = client
            .get_connection()
            .map_err(|e| format_redis_uri_error(&e, uri))?;

        if !uri_authority_has_credentials(uri) {
            authenticate(&mut connection, user, password)
                .map_err(|e| format_redis_uri_error(&e, uri))?;
        }

        if let Some(db) = database {
            select_db(&mut connection, db).map_err(|e| format_redis_uri_error(&e, uri))?;
        }

        redis::cmd("PING")
            .query::<String>(&mut connection)
            .map_err(|e| format_redis_uri_error(&e, uri))?;

        log::info!("Connected to Redis at {}", sanitize_uri(uri));

        Ok(RedisConnection {
            connection: Mutex::new(connection),
        })
    }
}

impl Default for RedisDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// A single blocking connection, shared by the sources of one browser.
pub struct RedisConnection {
    connection: Mutex<redis::Connection>,
}

impl RedisConnection {
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut redis::Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut conn = self
            .connection
            .lock()
            .map_err(|e| DbError::query_failed(format!("Lock error: {}", e)))?;

        f(&mut conn)
    }

    pub fn ping(&self) -> Result<(), DbError> {
        self.with_connection(|conn| {
            redis::cmd("PING")
                .query::<String>(conn)
                .map_err(|e| format_redis_query_error(&e))?;
            Ok(())
        })
    }

    /// Runs an arbitrary command, discarding the reply.
    pub fn run_command(&self, name: &str, args: &[&str]) -> Result<(), DbError> {
        self.with_connection(|conn| {
            redis::cmd(name)
                .arg(args)
                .query::<redis::Value>(conn)
                .map_err(|e| format_redis_query_error(&e))?;
            Ok(())
        })
    }

    /// Type, length and TTL of `key`.
    pub fn key_info(&self, key: &str) -> Result<KeyInfo, DbError> {
        self.with_connection(|conn| {
            let type_name = redis::cmd("TYPE")
                .arg(key)
                .query::<String>(conn)
                .map_err(|e| format_redis_query_error(&e))?;

            if type_name.eq_ignore_ascii_case("none") {
                return Err(DbError::object_not_found(format!("Key '{}' not found", key)));
            }

            let key_type = parse_key_type(&type_name);
            let length = match length_command(key_type) {
                Some(command) => redis::cmd(command)
                    .arg(key)
                    .query::<u64>(conn)
                    .map_err(|e| format_redis_query_error(&e))?,
                None => 0,
            };

            let ttl = redis::cmd("TTL")
                .arg(key)
                .query::<i64>(conn)
                .map_err(|e| format_redis_query_error(&e))?;

            Ok(KeyInfo {
                key: key.to_string(),
                key_type,
                length,
                ttl_seconds: if ttl < 0 { None } else { Some(ttl) },
            })
        })
    }
}

fn length_command(key_type: KeyType) -> Option<&'static str> {
    match key_type {
        KeyType::SortedSet => Some("ZCARD"),
        KeyType::Hash => Some("HLEN"),
        KeyType::Stream => Some("XLEN"),
        KeyType::Set => Some("SCARD"),
        KeyType::List => Some("LLEN"),
        KeyType::String => Some("STRLEN"),
        KeyType::Json | KeyType::Unknown => None,
    }
}

// --- Errors ---

fn format_connection_message(source: &str, host: &str, port: u16) -> String {
    let lower = source.to_ascii_lowercase();

    if lower.contains("connection refused") {
        format!("Connection refused. Is Redis running at {}:{}?", host, port)
    } else if lower.contains("timed out") {
        "Connection timed out".to_string()
    } else if lower.contains("noauth") || lower.contains("wrongpass") {
        "Authentication failed. Check credentials.".to_string()
    } else {
        source.to_string()
    }
}

fn format_uri_message(source: &str, sanitized_uri: &str) -> String {
    let lower = source.to_ascii_lowercase();

    if lower.contains("connection refused") {
        format!("Connection refused. Check URI: {}", sanitized_uri)
    } else if lower.contains("noauth") || lower.contains("wrongpass") {
        "Authentication failed. Check credentials.".to_string()
    } else if lower.contains("timed out") {
        "Connection timed out".to_string()
    } else {
        source.to_string()
    }
}

fn format_redis_error(error: &redis::RedisError, host: &str, port: u16) -> DbError {
    DbError::connection_failed(format_connection_message(&error.to_string(), host, port))
}

fn format_redis_uri_error(error: &redis::RedisError, uri: &str) -> DbError {
    let sanitized = sanitize_uri(uri);
    let source = error.to_string().replace(uri, &sanitized);
    DbError::connection_failed(format_uri_message(&source, &sanitized))
}

pub(crate) fn format_redis_query_error(error: &redis::RedisError) -> DbError {
    DbError::query_failed(error.to_string())
}

/// Masks the password of a connection URI for logs and error messages.
pub fn sanitize_uri(uri: &str) -> String {
    let Some((credentials, rest)) = uri.rsplit_once('@') else {
        return uri.to_string();
    };

    let (scheme, credentials) = match credentials.split_once("://") {
        Some((scheme, credentials)) => (format!("{}://", scheme), credentials),
        None => (String::new(), credentials),
    };

    match credentials.split_once(':') {
        Some((user, _)) => format!("{}{}:***@{}", scheme, user, rest),
        None => format!("{}***@{}", scheme, rest),
    }
}

fn authenticate(
    conn: &mut redis::Connection,
    user: Option<&str>,
    password: Option<&str>,
) -> redis::RedisResult<()> {
    if let Some(password) = password {
        let mut command = redis::cmd("AUTH");
        if let Some(user) = user
            && !user.is_empty()
        {
            command.arg(user);
        }
        command.arg(password);
        command.query::<String>(conn)?;
    }

    Ok(())
}

fn select_db(conn: &mut redis::Connection, db_index: u32) -> redis::RedisResult<()> {
    redis::cmd("SELECT").arg(db_index).query::<String>(conn)?;
    Ok(())
}

fn uri_authority_has_credentials(uri: &str) -> bool {
    if let Some((_, rest)) = uri.split_once("://") {
        let authority = rest.split('/').next().unwrap_or_default();
        return authority.contains('@');
    }

    false
}

pub(crate) fn parse_key_type(type_name: &str) -> KeyType {
    let normalized = type_name.trim().to_ascii_lowercase();

    match normalized.as_str() {
        "string" => KeyType::String,
        "hash" => KeyType::Hash,
        "list" => KeyType::List,
        "set" => KeyType::Set,
        "zset" => KeyType::SortedSet,
        "stream" => KeyType::Stream,
        "json" | "rejson-rl" => KeyType::Json,
        _ if normalized.contains("json") => KeyType::Json,
        _ => KeyType::Unknown,
    }
}
