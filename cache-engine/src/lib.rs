use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::{RedisError, Value};
use tracing::warn;

use shared::config::Config;
use shared::{Error, Result, TtlSeconds};
use trolley::ports::CartTransport;

pub mod retry;

use retry::RetryPolicy;

/// One transport operation: a primitive hash/key command or a script
/// invocation. A closed set, so retry and timeout handling stay uniform.
enum CacheCommand {
    HashEntries { key: String },
    DeleteField { key: String, field: String },
    FieldCount { key: String },
    KeyExists { key: String },
    DeleteKey { key: String },
    RefreshExpiry { key: String, ttl: u64 },
    Ping,
    Script { source: &'static str, keys: Vec<String>, args: Vec<String> },
}

impl CacheCommand {
    fn name(&self) -> &'static str {
        match self {
            CacheCommand::HashEntries { .. } => "HGETALL",
            CacheCommand::DeleteField { .. } => "HDEL",
            CacheCommand::FieldCount { .. } => "HLEN",
            CacheCommand::KeyExists { .. } => "EXISTS",
            CacheCommand::DeleteKey { .. } => "DEL",
            CacheCommand::RefreshExpiry { .. } => "EXPIRE",
            CacheCommand::Ping => "PING",
            CacheCommand::Script { .. } => "EVALSHA",
        }
    }
}

/// Redis-backed implementation of the cart transport port.
///
/// Owns a bounded connection pool. Every command runs under a per-attempt
/// timeout; transient failures are retried with backoff, each attempt on a
/// freshly checked-out pooled connection.
pub struct RedisTransport {
    pool: Pool,
    command_timeout: Duration,
    retry: RetryPolicy,
}

impl RedisTransport {
    /// Build the pool from configuration without touching the network.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut pool_config = PoolConfig::new(config.redis_max_connections);
        pool_config.timeouts.create = Some(Duration::from_secs(config.redis_connect_timeout_secs));
        pool_config.timeouts.wait = Some(Duration::from_secs(config.redis_connect_timeout_secs));

        let mut settings = deadpool_redis::Config::from_url(config.redis_url.clone());
        settings.pool = Some(pool_config);
        let pool = settings
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|error| Error::CacheUnavailable(format!("failed to build redis pool: {error}")))?;

        Ok(Self {
            pool,
            command_timeout: Duration::from_secs(config.redis_command_timeout_secs),
            retry: RetryPolicy::default(),
        })
    }

    /// Build the pool and verify connectivity with a PING, failing fast when
    /// the cache server is unreachable at startup.
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = Self::from_config(config)?;
        transport.run(CacheCommand::Ping).await?;
        Ok(transport)
    }

    async fn run(&self, command: CacheCommand) -> Result<Value> {
        // Tracks whether any attempt may have reached the server without a
        // reply: a timed-out or dropped-mid-flight script can still have
        // executed, which callers must not confuse with a definite failure.
        let mut ambiguous = false;
        let mut last_error = String::new();

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry.jittered_delay(attempt - 1)).await;
            }
            match tokio::time::timeout(self.command_timeout, self.execute(&command)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) if !is_retryable(&error) => {
                    let message = format!("{}: {error}", command.name());
                    return Err(if ambiguous {
                        Error::UnknownOutcome(message)
                    } else {
                        Error::CacheUnavailable(message)
                    });
                }
                Ok(Err(error)) => {
                    ambiguous |= may_have_applied(&error);
                    warn!(
                        command = command.name(),
                        attempt = attempt + 1,
                        %error,
                        "retryable cache failure"
                    );
                    last_error = error.to_string();
                }
                Err(_) => {
                    ambiguous = true;
                    warn!(
                        command = command.name(),
                        attempt = attempt + 1,
                        timeout_ms = self.command_timeout.as_millis() as u64,
                        "cache command timed out"
                    );
                    last_error = format!("timed out after {:?}", self.command_timeout);
                }
            }
        }

        Err(exhaustion_error(&command, self.retry.max_attempts, ambiguous, &last_error))
    }

    async fn execute(&self, command: &CacheCommand) -> std::result::Result<Value, RedisError> {
        let mut conn = self.pool.get().await.map_err(pool_error)?;
        match command {
            CacheCommand::HashEntries { key } => {
                redis::cmd("HGETALL").arg(key).query_async(&mut *conn).await
            }
            CacheCommand::DeleteField { key, field } => {
                redis::cmd("HDEL").arg(key).arg(field).query_async(&mut *conn).await
            }
            CacheCommand::FieldCount { key } => {
                redis::cmd("HLEN").arg(key).query_async(&mut *conn).await
            }
            CacheCommand::KeyExists { key } => {
                redis::cmd("EXISTS").arg(key).query_async(&mut *conn).await
            }
            CacheCommand::DeleteKey { key } => {
                redis::cmd("DEL").arg(key).query_async(&mut *conn).await
            }
            CacheCommand::RefreshExpiry { key, ttl } => {
                redis::cmd("EXPIRE").arg(key).arg(*ttl).query_async(&mut *conn).await
            }
            CacheCommand::Ping => redis::cmd("PING").query_async(&mut *conn).await,
            CacheCommand::Script { source, keys, args } => {
                let script = redis::Script::new(source);
                let mut invocation = script.prepare_invoke();
                for key in keys {
                    invocation.key(key.as_str());
                }
                for arg in args {
                    invocation.arg(arg.as_str());
                }
                invocation.invoke_async(&mut *conn).await
            }
        }
    }
}

#[async_trait]
impl CartTransport for RedisTransport {
    async fn invoke_script(
        &self,
        source: &'static str,
        keys: &[&str],
        args: &[String],
    ) -> Result<Value> {
        self.run(CacheCommand::Script {
            source,
            keys: keys.iter().map(|key| key.to_string()).collect(),
            args: args.to_vec(),
        })
        .await
    }

    async fn hash_entries(&self, key: &str) -> Result<Vec<(String, String)>> {
        let value = self.run(CacheCommand::HashEntries { key: key.to_string() }).await?;
        decode_reply(&value, "HGETALL")
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<bool> {
        let value = self
            .run(CacheCommand::DeleteField { key: key.to_string(), field: field.to_string() })
            .await?;
        let removed: i64 = decode_reply(&value, "HDEL")?;
        Ok(removed > 0)
    }

    async fn field_count(&self, key: &str) -> Result<u64> {
        let value = self.run(CacheCommand::FieldCount { key: key.to_string() }).await?;
        decode_reply(&value, "HLEN")
    }

    async fn key_exists(&self, key: &str) -> Result<bool> {
        let value = self.run(CacheCommand::KeyExists { key: key.to_string() }).await?;
        let found: i64 = decode_reply(&value, "EXISTS")?;
        Ok(found > 0)
    }

    async fn delete_key(&self, key: &str) -> Result<bool> {
        let value = self.run(CacheCommand::DeleteKey { key: key.to_string() }).await?;
        let removed: i64 = decode_reply(&value, "DEL")?;
        Ok(removed > 0)
    }

    async fn refresh_expiry(&self, key: &str, ttl: TtlSeconds) -> Result<bool> {
        let value = self
            .run(CacheCommand::RefreshExpiry { key: key.to_string(), ttl: ttl.0 })
            .await?;
        let applied: i64 = decode_reply(&value, "EXPIRE")?;
        Ok(applied > 0)
    }

    async fn ping(&self) -> Result<()> {
        self.run(CacheCommand::Ping).await.map(|_| ())
    }
}

impl std::fmt::Debug for RedisTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTransport")
            .field("pool", &self.pool.status())
            .field("command_timeout", &self.command_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Connectivity failures are worth retrying on a fresh connection; anything
/// else (authentication, malformed command, a script raising) fails the same
/// way every time.
fn is_retryable(error: &RedisError) -> bool {
    error.is_io_error()
        || error.is_timeout()
        || error.is_connection_dropped()
        || error.is_connection_refusal()
}

/// True when the request may have reached the server before the failure, so
/// the command may have executed without us seeing the reply.
fn may_have_applied(error: &RedisError) -> bool {
    error.is_timeout() || error.is_connection_dropped()
}

fn exhaustion_error(command: &CacheCommand, attempts: u32, ambiguous: bool, last_error: &str) -> Error {
    let message = format!("{} failed after {attempts} attempts: {last_error}", command.name());
    if ambiguous {
        Error::UnknownOutcome(message)
    } else {
        Error::CacheUnavailable(message)
    }
}

fn pool_error(error: deadpool_redis::PoolError) -> RedisError {
    match error {
        deadpool_redis::PoolError::Backend(error) => error,
        // No connection was checked out, so nothing reached the server.
        other => std::io::Error::new(std::io::ErrorKind::NotConnected, other.to_string()).into(),
    }
}

fn decode_reply<T: redis::FromRedisValue>(value: &Value, command: &str) -> Result<T> {
    redis::from_redis_value(value)
        .map_err(|error| Error::CacheUnavailable(format!("unexpected {command} reply: {error}")))
}
