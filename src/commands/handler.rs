//! Command Dispatcher and Key/Value Handlers
//!
//! A command is looked up by its upper-cased name in a table built once per
//! process. Each handler validates its arguments and either answers
//! immediately ([`Reply::Ready`]) or returns a future that performs the
//! backend call and translates the outcome ([`Reply::Pending`]).
//!
//! Handlers know nothing about sessions or ordering. The session enqueues a
//! pending slot before calling [`dispatch`], then fills the slot with whatever
//! the handler produces (see `session`).
//!
//! ## Backend outcome translation
//!
//! | outcome            | reply                                   |
//! |--------------------|-----------------------------------------|
//! | success            | command specific (`+OK`, value, ...)    |
//! | not found          | `GET` → `$-1`, `TTL`/`PTTL` → `:-2`     |
//! | status code `n`    | `-ERR internal error n`                 |
//! | deadline exceeded  | `-ERR timeout`                          |

use crate::commands::geo;
use crate::geo::GeoService;
use crate::protocol::{Command, ReplyValue};
use crate::storage::{epoch_now, generate_key, BackendError, BackendResult, StorageBackend};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Policy applied to every backend and geo call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyOptions {
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Extra attempts after a transient failure (timeout / unavailable).
    pub max_retry_times: u32,
}

impl ProxyOptions {
    /// Longest a single call may take, retries included.
    pub fn call_budget(&self) -> Duration {
        self.timeout.saturating_mul(self.max_retry_times.saturating_add(1))
    }
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retry_times: 0,
        }
    }
}

/// Everything a handler may call into. Shared by all sessions.
#[derive(Clone)]
pub struct CommandContext {
    storage: Arc<dyn StorageBackend>,
    geo: Option<Arc<dyn GeoService>>,
    options: ProxyOptions,
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("geo", &self.geo.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl CommandContext {
    pub fn new(storage: Arc<dyn StorageBackend>, options: ProxyOptions) -> Self {
        Self {
            storage,
            geo: None,
            options,
        }
    }

    /// Attaches the geo extension. `SET`/`DEL` are then routed through it.
    pub fn with_geo(mut self, geo: Arc<dyn GeoService>) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn geo(&self) -> Option<&Arc<dyn GeoService>> {
        self.geo.as_ref()
    }

    pub fn options(&self) -> ProxyOptions {
        self.options
    }
}

/// What a handler produced for one command.
pub enum Reply {
    /// Answer known without a backend round trip (arity errors, bad options).
    Ready(ReplyValue),
    /// Backend call in flight; resolves to the translated reply.
    Pending(BoxFuture<'static, ReplyValue>),
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Reply::Pending(_) => f.write_str("Pending"),
        }
    }
}

impl Reply {
    /// Drives the reply to completion. Used by tests and benches.
    pub async fn resolve(self) -> ReplyValue {
        match self {
            Reply::Ready(value) => value,
            Reply::Pending(future) => future.await,
        }
    }
}

/// A command handler.
pub type CommandFn = fn(&CommandContext, &Command) -> Reply;

fn handler_table() -> &'static HashMap<&'static str, CommandFn> {
    static TABLE: OnceLock<HashMap<&'static str, CommandFn>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: HashMap<&'static str, CommandFn> = HashMap::new();
        table.insert("SET", cmd_set);
        table.insert("GET", cmd_get);
        table.insert("DEL", cmd_del);
        table.insert("SETEX", cmd_setex);
        table.insert("TTL", cmd_ttl);
        table.insert("PTTL", cmd_pttl);
        table.insert("GEODIST", geo::cmd_geodist);
        table.insert("GEORADIUS", geo::cmd_georadius);
        table.insert("GEORADIUSBYMEMBER", geo::cmd_georadius_by_member);
        table
    })
}

/// Finds the handler for a command name, case-insensitively.
pub fn lookup(name: &[u8]) -> CommandFn {
    let normalized = String::from_utf8_lossy(name).to_ascii_uppercase();
    handler_table()
        .get(normalized.as_str())
        .copied()
        .unwrap_or(cmd_unknown)
}

/// Routes a command to its handler.
pub fn dispatch(ctx: &CommandContext, command: &Command) -> Reply {
    lookup(command.name())(ctx, command)
}

// ============================================================================
// Helpers shared with the geo handlers
// ============================================================================

pub(crate) fn wrong_arity(name: &str) -> Reply {
    debug!(command = name, "wrong number of arguments");
    Reply::Ready(ReplyValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name
    )))
}

/// `-ERR <error>` for any backend failure the caller does not special-case.
pub(crate) fn error_reply(command: &str, err: &BackendError) -> ReplyValue {
    warn!(command, error = %err, "backend call failed");
    ReplyValue::error(format!("ERR {}", err))
}

/// Runs `op` under the configured deadline, retrying transient failures.
pub(crate) async fn call_with_retry<T, F, Fut>(options: ProxyOptions, mut op: F) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BackendResult<T>>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::time::timeout(options.timeout, op())
            .await
            .unwrap_or(Err(BackendError::Timeout));
        match result {
            Err(err) if err.is_transient() && attempt < options.max_retry_times => {
                attempt += 1;
                debug!(attempt, error = %err, "retrying backend call");
            }
            other => return other,
        }
    }
}

/// Storage key for a plain Redis key, or a ready error if it cannot be encoded.
fn storage_key(key: &Bytes) -> Result<Bytes, Reply> {
    generate_key(key, b"").ok_or_else(|| Reply::Ready(ReplyValue::error("ERR key is too long")))
}

fn parse_i64(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

// ============================================================================
// Handlers
// ============================================================================

fn cmd_unknown(_ctx: &CommandContext, command: &Command) -> Reply {
    let name = command.name_lossy();
    debug!(command = %name, "unknown command");
    Reply::Ready(ReplyValue::error(format!("ERR unknown command '{}'", name)))
}

/// SET key value [EX seconds]
///
/// Only `EX` is honoured; other options are ignored with a warning.
fn cmd_set(ctx: &CommandContext, command: &Command) -> Reply {
    let args = command.args();
    if args.len() < 3 {
        return wrong_arity("set");
    }

    let mut ttl_seconds: u64 = 0;
    let mut i = 3;
    while i < args.len() {
        if args[i].eq_ignore_ascii_case(b"EX") && i + 1 < args.len() {
            match parse_i64(&args[i + 1]) {
                Some(secs) if secs > 0 => ttl_seconds = secs as u64,
                _ => warn!(
                    value = %String::from_utf8_lossy(&args[i + 1]),
                    "invalid 'EX' option, storing without expiry"
                ),
            }
            i += 2;
        } else {
            warn!(
                option = %String::from_utf8_lossy(&args[i]),
                "only 'EX' option is supported"
            );
            i += 1;
        }
    }

    let key = match storage_key(&args[1]) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    let value = args[2].clone();
    let options = ctx.options;

    if let Some(geo) = ctx.geo.clone() {
        let hash_key = args[1].clone();
        return Reply::Pending(Box::pin(async move {
            let result = call_with_retry(options, || {
                let geo = geo.clone();
                let (hash_key, value) = (hash_key.clone(), value.clone());
                async move { geo.set(hash_key, Bytes::new(), value, ttl_seconds).await }
            })
            .await;
            match result {
                Ok(()) => ReplyValue::ok(),
                Err(err) => error_reply("set", &err),
            }
        }));
    }

    let expire_ts = if ttl_seconds > 0 {
        epoch_now().saturating_add(ttl_seconds)
    } else {
        0
    };
    let storage = ctx.storage.clone();
    Reply::Pending(Box::pin(async move {
        let result = call_with_retry(options, || {
            let storage = storage.clone();
            let (key, value) = (key.clone(), value.clone());
            async move { storage.put(key, value, expire_ts).await }
        })
        .await;
        match result {
            Ok(()) => ReplyValue::ok(),
            Err(err) => error_reply("set", &err),
        }
    }))
}

/// SETEX key seconds value
fn cmd_setex(ctx: &CommandContext, command: &Command) -> Reply {
    let args = command.args();
    if args.len() != 4 {
        return wrong_arity("setex");
    }

    let ttl_seconds = match parse_i64(&args[2]) {
        Some(secs) => secs,
        None => {
            return Reply::Ready(ReplyValue::error(
                "ERR value is not an integer or out of range",
            ))
        }
    };
    if ttl_seconds <= 0 {
        return Reply::Ready(ReplyValue::error("ERR invalid expire time in setex"));
    }

    let key = match storage_key(&args[1]) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    let value = args[3].clone();
    let expire_ts = epoch_now().saturating_add(ttl_seconds as u64);
    let storage = ctx.storage.clone();
    let options = ctx.options;

    Reply::Pending(Box::pin(async move {
        let result = call_with_retry(options, || {
            let storage = storage.clone();
            let (key, value) = (key.clone(), value.clone());
            async move { storage.put(key, value, expire_ts).await }
        })
        .await;
        match result {
            Ok(()) => ReplyValue::ok(),
            Err(err) => error_reply("setex", &err),
        }
    }))
}

/// GET key
fn cmd_get(ctx: &CommandContext, command: &Command) -> Reply {
    let args = command.args();
    if args.len() != 2 {
        return wrong_arity("get");
    }

    let key = match storage_key(&args[1]) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    let storage = ctx.storage.clone();
    let options = ctx.options;

    Reply::Pending(Box::pin(async move {
        let result = call_with_retry(options, || {
            let storage = storage.clone();
            let key = key.clone();
            async move { storage.get(key).await }
        })
        .await;
        match result {
            Ok(value) => ReplyValue::bulk_string(value),
            Err(BackendError::NotFound) => ReplyValue::null(),
            Err(err) => error_reply("get", &err),
        }
    }))
}

/// DEL key
///
/// Only one key per command. Replies `:1` from the storage path and `+OK`
/// from the geo path.
fn cmd_del(ctx: &CommandContext, command: &Command) -> Reply {
    let args = command.args();
    if args.len() != 2 {
        return wrong_arity("del");
    }

    let key = match storage_key(&args[1]) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    let options = ctx.options;

    if let Some(geo) = ctx.geo.clone() {
        let hash_key = args[1].clone();
        return Reply::Pending(Box::pin(async move {
            let result = call_with_retry(options, || {
                let geo = geo.clone();
                let hash_key = hash_key.clone();
                async move { geo.del(hash_key, Bytes::new()).await }
            })
            .await;
            match result {
                Ok(()) => ReplyValue::ok(),
                Err(err) => error_reply("del", &err),
            }
        }));
    }

    let storage = ctx.storage.clone();
    Reply::Pending(Box::pin(async move {
        let result = call_with_retry(options, || {
            let storage = storage.clone();
            let key = key.clone();
            async move { storage.remove(key).await }
        })
        .await;
        match result {
            Ok(()) => ReplyValue::integer(1),
            Err(err) => error_reply("del", &err),
        }
    }))
}

fn cmd_ttl(ctx: &CommandContext, command: &Command) -> Reply {
    ttl_common(ctx, command, false)
}

fn cmd_pttl(ctx: &CommandContext, command: &Command) -> Reply {
    ttl_common(ctx, command, true)
}

/// TTL key / PTTL key
///
/// The backend has second granularity, so PTTL is seconds × 1000.
fn ttl_common(ctx: &CommandContext, command: &Command, millis: bool) -> Reply {
    let name = if millis { "pttl" } else { "ttl" };
    let args = command.args();
    if args.len() != 2 {
        return wrong_arity(name);
    }

    let key = match storage_key(&args[1]) {
        Ok(key) => key,
        Err(reply) => return reply,
    };
    let storage = ctx.storage.clone();
    let options = ctx.options;

    Reply::Pending(Box::pin(async move {
        let result = call_with_retry(options, || {
            let storage = storage.clone();
            let key = key.clone();
            async move { storage.ttl(key).await }
        })
        .await;
        match result {
            // -1: no expiry
            Ok(secs) if secs < 0 => ReplyValue::integer(-1),
            Ok(secs) if millis => ReplyValue::integer(secs.saturating_mul(1000)),
            Ok(secs) => ReplyValue::integer(secs),
            Err(BackendError::NotFound) => ReplyValue::integer(-2),
            Err(err) => error_reply(name, &err),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Backend that fails every call with a fixed error and counts attempts.
    struct FailingBackend {
        error: BackendError,
        calls: AtomicU32,
    }

    impl FailingBackend {
        fn new(error: BackendError) -> Self {
            Self {
                error,
                calls: AtomicU32::new(0),
            }
        }

        fn fail<T>(&self) -> BackendResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    #[async_trait]
    impl StorageBackend for FailingBackend {
        async fn put(&self, _key: Bytes, _value: Bytes, _ts: u64) -> BackendResult<()> {
            self.fail()
        }
        async fn get(&self, _key: Bytes) -> BackendResult<Bytes> {
            self.fail()
        }
        async fn remove(&self, _key: Bytes) -> BackendResult<()> {
            self.fail()
        }
        async fn ttl(&self, _key: Bytes) -> BackendResult<i64> {
            self.fail()
        }
    }

    /// Backend whose calls never complete.
    struct StalledBackend;

    #[async_trait]
    impl StorageBackend for StalledBackend {
        async fn put(&self, _key: Bytes, _value: Bytes, _ts: u64) -> BackendResult<()> {
            futures::future::pending().await
        }
        async fn get(&self, _key: Bytes) -> BackendResult<Bytes> {
            futures::future::pending().await
        }
        async fn remove(&self, _key: Bytes) -> BackendResult<()> {
            futures::future::pending().await
        }
        async fn ttl(&self, _key: Bytes) -> BackendResult<i64> {
            futures::future::pending().await
        }
    }

    fn context() -> (Arc<StorageEngine>, CommandContext) {
        let engine = Arc::new(StorageEngine::new());
        let ctx = CommandContext::new(engine.clone(), ProxyOptions::default());
        (engine, ctx)
    }

    async fn run(ctx: &CommandContext, args: &[&str]) -> ReplyValue {
        dispatch(ctx, &Command::from_strs(args)).resolve().await
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let (_, ctx) = context();
        assert_eq!(run(&ctx, &["sEt", "k", "v"]).await, ReplyValue::ok());
        assert_eq!(
            run(&ctx, &["GeT", "k"]).await,
            ReplyValue::bulk_string(Bytes::from("v"))
        );
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (_, ctx) = context();
        assert_eq!(
            run(&ctx, &["FLUSHALL"]).await,
            ReplyValue::error("ERR unknown command 'FLUSHALL'")
        );
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_, ctx) = context();
        assert_eq!(run(&ctx, &["SET", "name", "Ariz"]).await, ReplyValue::ok());
        assert_eq!(
            run(&ctx, &["get", "name"]).await,
            ReplyValue::bulk_string(Bytes::from("Ariz"))
        );
    }

    #[tokio::test]
    async fn test_set_arity_is_answered_without_backend() {
        let backend = Arc::new(FailingBackend::new(BackendError::Status(1)));
        let ctx = CommandContext::new(backend.clone(), ProxyOptions::default());

        let reply = dispatch(&ctx, &Command::from_strs(&["SET", "key"]));
        assert!(matches!(
            reply,
            Reply::Ready(ReplyValue::SimpleString { is_error: true, .. })
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ready_reply_needs_no_runtime() {
        let (_, ctx) = context();
        let reply = dispatch(&ctx, &Command::from_strs(&["TTL"]));
        assert_eq!(
            tokio_test::block_on(reply.resolve()),
            ReplyValue::error("ERR wrong number of arguments for 'ttl' command")
        );
    }

    #[tokio::test]
    async fn test_set_with_ex() {
        let (engine, ctx) = context();
        assert_eq!(
            run(&ctx, &["SET", "session", "token", "EX", "100"]).await,
            ReplyValue::ok()
        );
        let key = generate_key(b"session", b"").unwrap();
        let ttl = engine.ttl_at(&key, epoch_now()).unwrap();
        assert!((99..=100).contains(&ttl), "{}", ttl);
    }

    #[tokio::test]
    async fn test_set_ignores_unsupported_options() {
        let (engine, ctx) = context();
        assert_eq!(
            run(&ctx, &["SET", "k", "v", "NX", "EX", "oops"]).await,
            ReplyValue::ok()
        );
        let key = generate_key(b"k", b"").unwrap();
        assert_eq!(engine.ttl_at(&key, epoch_now()), Some(-1));
    }

    #[tokio::test]
    async fn test_get_missing_is_null() {
        let (_, ctx) = context();
        assert_eq!(run(&ctx, &["GET", "missing"]).await, ReplyValue::null());
    }

    #[tokio::test]
    async fn test_get_arity() {
        let (_, ctx) = context();
        assert_eq!(
            run(&ctx, &["GET"]).await,
            ReplyValue::error("ERR wrong number of arguments for 'get' command")
        );
        assert!(run(&ctx, &["GET", "a", "b"]).await.is_error());
    }

    #[tokio::test]
    async fn test_del() {
        let (_, ctx) = context();
        run(&ctx, &["SET", "k", "v"]).await;
        assert_eq!(run(&ctx, &["DEL", "k"]).await, ReplyValue::integer(1));
        assert_eq!(run(&ctx, &["GET", "k"]).await, ReplyValue::null());
        assert!(run(&ctx, &["DEL", "a", "b"]).await.is_error());
    }

    #[tokio::test]
    async fn test_setex_and_ttl() {
        let (_, ctx) = context();
        assert_eq!(run(&ctx, &["SETEX", "k", "60", "v"]).await, ReplyValue::ok());

        let ttl = run(&ctx, &["TTL", "k"]).await.as_integer().unwrap();
        assert!((59..=60).contains(&ttl), "{}", ttl);

        let pttl = run(&ctx, &["PTTL", "k"]).await.as_integer().unwrap();
        assert!((59_000..=60_000).contains(&pttl), "{}", pttl);
        assert_eq!(pttl % 1000, 0);
    }

    #[tokio::test]
    async fn test_setex_validation() {
        let (_, ctx) = context();
        assert_eq!(
            run(&ctx, &["SETEX", "k", "abc", "v"]).await,
            ReplyValue::error("ERR value is not an integer or out of range")
        );
        assert_eq!(
            run(&ctx, &["SETEX", "k", "0", "v"]).await,
            ReplyValue::error("ERR invalid expire time in setex")
        );
        assert_eq!(
            run(&ctx, &["SETEX", "k", "10"]).await,
            ReplyValue::error("ERR wrong number of arguments for 'setex' command")
        );
    }

    #[tokio::test]
    async fn test_huge_expiry_saturates() {
        let (_, ctx) = context();
        assert_eq!(
            run(&ctx, &["SETEX", "k", "9223372036854775000", "v"]).await,
            ReplyValue::ok()
        );
        assert_eq!(run(&ctx, &["PTTL", "k"]).await, ReplyValue::integer(i64::MAX));

        let ttl = run(&ctx, &["TTL", "k"]).await.as_integer().unwrap();
        assert!(ttl > 9_223_372_036_854_770_000, "{}", ttl);

        assert_eq!(
            run(&ctx, &["SET", "j", "v", "EX", "9223372036854775807"]).await,
            ReplyValue::ok()
        );
        assert_eq!(run(&ctx, &["PTTL", "j"]).await, ReplyValue::integer(i64::MAX));
    }

    #[test]
    fn test_call_budget_covers_retries() {
        let options = ProxyOptions {
            timeout: Duration::from_millis(100),
            max_retry_times: 2,
        };
        assert_eq!(options.call_budget(), Duration::from_millis(300));
        assert_eq!(ProxyOptions::default().call_budget(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_ttl_missing_and_persistent() {
        let (_, ctx) = context();
        assert_eq!(run(&ctx, &["TTL", "missing"]).await, ReplyValue::integer(-2));
        assert_eq!(run(&ctx, &["PTTL", "missing"]).await, ReplyValue::integer(-2));

        run(&ctx, &["SET", "forever", "v"]).await;
        assert_eq!(run(&ctx, &["TTL", "forever"]).await, ReplyValue::integer(-1));
        assert_eq!(run(&ctx, &["PTTL", "forever"]).await, ReplyValue::integer(-1));
        assert_eq!(
            run(&ctx, &["PTTL"]).await,
            ReplyValue::error("ERR wrong number of arguments for 'pttl' command")
        );
    }

    #[tokio::test]
    async fn test_backend_status_is_translated() {
        let backend = Arc::new(FailingBackend::new(BackendError::Status(5)));
        let ctx = CommandContext::new(backend, ProxyOptions::default());
        assert_eq!(
            run(&ctx, &["SET", "k", "v"]).await,
            ReplyValue::error("ERR internal error 5")
        );
        assert_eq!(
            run(&ctx, &["GET", "k"]).await,
            ReplyValue::error("ERR internal error 5")
        );
        assert_eq!(
            run(&ctx, &["TTL", "k"]).await,
            ReplyValue::error("ERR internal error 5")
        );
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let backend = Arc::new(FailingBackend::new(BackendError::Unavailable(
            "replica down".into(),
        )));
        let options = ProxyOptions {
            max_retry_times: 2,
            ..Default::default()
        };
        let ctx = CommandContext::new(backend.clone(), options);

        assert!(run(&ctx, &["GET", "k"]).await.is_error());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_status_errors_are_not_retried() {
        let backend = Arc::new(FailingBackend::new(BackendError::Status(2)));
        let options = ProxyOptions {
            max_retry_times: 5,
            ..Default::default()
        };
        let ctx = CommandContext::new(backend.clone(), options);

        run(&ctx, &["GET", "k"]).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_becomes_timeout_error() {
        let options = ProxyOptions {
            timeout: Duration::from_millis(50),
            max_retry_times: 0,
        };
        let ctx = CommandContext::new(Arc::new(StalledBackend), options);
        assert_eq!(
            run(&ctx, &["GET", "k"]).await,
            ReplyValue::error("ERR timeout")
        );
    }

    #[tokio::test]
    async fn test_key_too_long() {
        let (_, ctx) = context();
        let long = "k".repeat(70_000);
        assert_eq!(
            run(&ctx, &["GET", long.as_str()]).await,
            ReplyValue::error("ERR key is too long")
        );
    }
}
