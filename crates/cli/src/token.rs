//! `janus token` subcommands.

use clap::Subcommand;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use janus_core::{CancelToken, Entity, ExecutionContext, NewOneTimeToken, OneTimeToken};
use janus_repository::{RowMapper, TokenMapper, TokenRepository, TokenRow};
use janus_storage::{Pagination, StorageError};

use crate::CliEnv;

#[derive(Subcommand)]
pub(crate) enum TokenCommands {
    /// Register a new one-time token
    Register {
        /// User the token belongs to
        #[arg(long)]
        user_id: Uuid,
        /// Secret value to hash and store; generated when omitted
        #[arg(long)]
        value: Option<String>,
        /// Hours until expiry
        #[arg(long, default_value = "24", allow_negative_numbers = true)]
        ttl_hours: i64,
    },

    /// Consume a token exactly once
    Consume {
        /// Token id to consume
        #[arg(long)]
        id: Option<Uuid>,
        /// Secret value to consume (resolved via its hash)
        #[arg(long)]
        value: Option<String>,
    },

    /// List stored tokens one page at a time
    List {
        #[arg(long, default_value = "1")]
        page: u64,
        #[arg(long, default_value = "50")]
        page_size: u64,
    },

    /// List tokens modified at or after an RFC 3339 instant
    Changes {
        /// Change cursor, e.g. 2025-06-01T12:00:00Z
        #[arg(long)]
        since: String,
    },
}

pub(crate) async fn run(env: &CliEnv, command: TokenCommands) -> Result<i32, StorageError> {
    let store = env.open_store::<TokenRow>("tokens.json")?;
    let repo = TokenRepository::new(store);
    let cancel = CancelToken::new();

    match command {
        TokenCommands::Register {
            user_id,
            value,
            ttl_hours,
        } => {
            let ctx = env.ctx("OneTimeToken.Register");
            let raw = value.unwrap_or_else(generate_value);
            let input = NewOneTimeToken {
                user_id,
                token_hash: hash_value(&raw),
                expires_at: ctx.now() + Duration::hours(ttl_hours),
            };
            let Some(token) = OneTimeToken::register_new(&ctx, input) else {
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            if !repo.register_new(&ctx, &token, &cancel).await? {
                env.report_failure(&ctx.messages());
                return Ok(1);
            }
            let mut json = serde_json::to_value(TokenMapper.to_row(&token))
                .unwrap_or_else(|_| serde_json::json!({}));
            // The raw value is shown exactly once; only the hash is stored.
            json["value"] = serde_json::Value::String(raw.clone());
            env.emit(
                json,
                &format!(
                    "registered token {} for user {} (value: {raw})",
                    token.info().id,
                    token.user_id()
                ),
            );
            Ok(0)
        }

        TokenCommands::Consume { id, value } => {
            let ctx = env.ctx("OneTimeToken.Consume");
            let Some(token) = resolve(&repo, &ctx, id, value.as_deref(), &cancel).await? else {
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            let Some(consumed) = token.register_mark_used(&ctx) else {
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            if !repo.update(&ctx, &consumed, &cancel).await? {
                env.report_failure(&ctx.messages());
                return Ok(1);
            }
            env.emit(
                serde_json::to_value(TokenMapper.to_row(&consumed))
                    .unwrap_or(serde_json::Value::Null),
                &format!("consumed token {}", consumed.info().id),
            );
            Ok(0)
        }

        TokenCommands::List { page, page_size } => {
            let ctx = env.ctx("OneTimeToken.List");
            let Some(pagination) = Pagination::new(page, page_size) else {
                ctx.add_error(
                    "Pagination.Page.OutOfRange",
                    "page and page-size must be positive",
                );
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            let mut rows = Vec::new();
            let mut lines = Vec::new();
            let mut handler = |ctx: &ExecutionContext, token: OneTimeToken, _: u64| {
                lines.push(describe(&token, ctx.now()));
                rows.push(TokenMapper.to_row(&token));
                true
            };
            let ok = repo
                .enumerate_all(&ctx, pagination, &mut handler, &cancel)
                .await?;
            if !ok {
                env.report_failure(&ctx.messages());
                return Ok(1);
            }
            env.emit(
                serde_json::to_value(&rows).unwrap_or(serde_json::Value::Null),
                &lines.join("\n"),
            );
            Ok(0)
        }

        TokenCommands::Changes { since } => {
            let ctx = env.ctx("OneTimeToken.Changes");
            let Ok(since) = OffsetDateTime::parse(&since, &Rfc3339) else {
                ctx.add_error(
                    "ChangeCursor.Since.Invalid",
                    "since must be an RFC 3339 instant",
                );
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            let mut rows = Vec::new();
            let mut lines = Vec::new();
            let mut handler = |ctx: &ExecutionContext, token: OneTimeToken, _: u64| {
                lines.push(describe(&token, ctx.now()));
                rows.push(TokenMapper.to_row(&token));
                true
            };
            let ok = repo
                .enumerate_modified_since(&ctx, since, &mut handler, &cancel)
                .await?;
            if !ok {
                env.report_failure(&ctx.messages());
                return Ok(1);
            }
            env.emit(
                serde_json::to_value(&rows).unwrap_or(serde_json::Value::Null),
                &lines.join("\n"),
            );
            Ok(0)
        }
    }
}

/// Look a token up by id or by the hash of its raw value.
async fn resolve<S: janus_repository::TokenStore>(
    repo: &TokenRepository<S>,
    ctx: &ExecutionContext,
    id: Option<Uuid>,
    value: Option<&str>,
    cancel: &CancelToken,
) -> Result<Option<OneTimeToken>, StorageError> {
    let found = match (id, value) {
        (Some(id), _) => repo.get_by_id(ctx, id, cancel).await?,
        (None, Some(value)) => repo.find_by_hash(ctx, &hash_value(value), cancel).await?,
        (None, None) => {
            ctx.add_error(
                "OneTimeToken.Id.IsRequired",
                "pass --id or --value to identify the token",
            );
            return Ok(None);
        }
    };
    if found.is_none() {
        ctx.add_warning("OneTimeToken.Id.NotFound", "no matching token");
    }
    Ok(found)
}

fn describe(token: &OneTimeToken, now: OffsetDateTime) -> String {
    format!(
        "token {} user={} state={:?} expires={}",
        token.info().id,
        token.user_id(),
        token.state(now),
        token
            .expires_at()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "-".to_owned()),
    )
}

fn hash_value(value: &str) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(Sha256::digest(value.as_bytes()))
}

fn generate_value() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}
