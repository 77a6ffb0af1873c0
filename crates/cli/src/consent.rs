//! `janus consent` subcommands.

use clap::Subcommand;
use uuid::Uuid;

use janus_core::{CancelToken, Entity, NewUserConsent, UserConsent};
use janus_repository::{ConsentMapper, ConsentRepository, ConsentRow, RowMapper};
use janus_storage::StorageError;

use crate::CliEnv;

#[derive(Subcommand)]
pub(crate) enum ConsentCommands {
    /// Grant a client access to a scope on behalf of a user
    Grant {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        client_id: Uuid,
        #[arg(long)]
        scope: String,
    },

    /// Revoke a previously granted consent
    Revoke {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        client_id: Uuid,
    },

    /// List a user's unrevoked consents
    List {
        #[arg(long)]
        user_id: Uuid,
    },
}

pub(crate) async fn run(env: &CliEnv, command: ConsentCommands) -> Result<i32, StorageError> {
    let store = env.open_store::<ConsentRow>("consents.json")?;
    let repo = ConsentRepository::new(store);
    let cancel = CancelToken::new();

    match command {
        ConsentCommands::Grant {
            user_id,
            client_id,
            scope,
        } => {
            let ctx = env.ctx("UserConsent.Grant");
            let input = NewUserConsent {
                user_id,
                client_id,
                scope,
            };
            let Some(consent) = UserConsent::register_new(&ctx, input) else {
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            if !repo.register_new(&ctx, &consent, &cancel).await? {
                env.report_failure(&ctx.messages());
                return Ok(1);
            }
            env.emit(
                serde_json::to_value(ConsentMapper.to_row(&consent))
                    .unwrap_or(serde_json::Value::Null),
                &format!(
                    "granted consent {} ({} -> {}, scope {})",
                    consent.info().id,
                    consent.user_id(),
                    consent.client_id(),
                    consent.scope()
                ),
            );
            Ok(0)
        }

        ConsentCommands::Revoke { user_id, client_id } => {
            let ctx = env.ctx("UserConsent.Revoke");
            let found = repo
                .find_for_user_client(&ctx, user_id, client_id, &cancel)
                .await?;
            let Some(consent) = found else {
                ctx.add_warning("UserConsent.Id.NotFound", "no consent for this user/client");
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            let Some(revoked) = consent.register_revoke(&ctx) else {
                env.report_failure(&ctx.messages());
                return Ok(1);
            };
            if !repo.update(&ctx, &revoked, &cancel).await? {
                env.report_failure(&ctx.messages());
                return Ok(1);
            }
            env.emit(
                serde_json::to_value(ConsentMapper.to_row(&revoked))
                    .unwrap_or(serde_json::Value::Null),
                &format!("revoked consent {}", revoked.info().id),
            );
            Ok(0)
        }

        ConsentCommands::List { user_id } => {
            let ctx = env.ctx("UserConsent.List");
            let consents = repo
                .find_granted_for_user(&ctx, user_id, &cancel)
                .await?;
            let rows: Vec<_> = consents.iter().map(|c| ConsentMapper.to_row(c)).collect();
            let lines: Vec<String> = consents.iter().map(describe).collect();
            env.emit(
                serde_json::to_value(&rows).unwrap_or(serde_json::Value::Null),
                &lines.join("\n"),
            );
            Ok(0)
        }
    }
}

fn describe(consent: &UserConsent) -> String {
    format!(
        "consent {} user={} client={} scope={}",
        consent.info().id,
        consent.user_id(),
        consent.client_id(),
        consent.scope()
    )
}
