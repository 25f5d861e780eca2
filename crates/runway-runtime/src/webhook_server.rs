//! HTTP ingress for GitHub webhook deliveries.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use runway_core::{CommandContext, PlatformClient, PullRequest, Repo, User};
use runway_github::{
    parse_comment_command, verify_sha256_hmac_signature, GithubWebhookEvent, IssueCommentEvent,
    PullRequestEvent,
};
use serde_json::json;
use tokio::net::TcpListener;

use crate::command_dispatcher::CommandDispatcher;
use crate::workspace::Workspace;

pub const DEFAULT_COMMENT_PREFIX: &str = "runway";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookServerConfig {
    pub bind: String,
    /// Shared secret for `x-hub-signature-256`; unsigned deliveries are
    /// accepted when unset.
    pub webhook_secret: Option<String>,
    pub comment_prefix: String,
}

pub struct WebhookServerState {
    pub config: WebhookServerConfig,
    pub dispatcher: Arc<CommandDispatcher>,
    pub client: Arc<dyn PlatformClient>,
    pub workspace: Arc<dyn Workspace>,
}

pub async fn run_webhook_server(state: Arc<WebhookServerState>) -> Result<()> {
    let listener = TcpListener::bind(state.config.bind.as_str())
        .await
        .with_context(|| format!("failed to bind {}", state.config.bind))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook server bound address")?;
    tracing::info!(
        addr = %local_addr,
        signed = state.config.webhook_secret.is_some(),
        "runway webhook server listening"
    );

    let app = build_webhook_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("runway webhook server exited unexpectedly")
}

pub fn build_webhook_router(state: Arc<WebhookServerState>) -> Router {
    Router::new()
        .route("/events", post(handle_github_event))
        .route("/healthz", get(handle_health))
        .with_state(state)
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(json!({"error":{"code":code,"message":message.into()}})),
    )
}

async fn handle_github_event(
    State(state): State<Arc<WebhookServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(secret) = state.config.webhook_secret.as_deref() {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or("");
        if let Err(error) = verify_sha256_hmac_signature(&body, signature, secret) {
            tracing::warn!(error = %error, "rejected webhook delivery");
            return error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_signature",
                "github webhook signature verification failed",
            );
        }
    }

    let event_name = headers
        .get("x-github-event")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let event = match GithubWebhookEvent::parse(event_name, &body) {
        Ok(event) => event,
        Err(error) => {
            tracing::warn!(event = event_name, error = %format!("{error:#}"), "unparseable webhook");
            return error_response(StatusCode::BAD_REQUEST, "parse_failed", format!("{error:#}"));
        }
    };

    match event {
        GithubWebhookEvent::IssueComment(comment) => handle_comment_event(&state, comment).await,
        GithubWebhookEvent::PullRequest(pull) => handle_pull_request_event(&state, pull).await,
        GithubWebhookEvent::Ignored { event_name } => {
            tracing::debug!(event = %event_name, "ignoring webhook event");
            (StatusCode::OK, Json(json!({"status":"ignored"})))
        }
    }
}

async fn handle_comment_event(
    state: &WebhookServerState,
    event: IssueCommentEvent,
) -> (StatusCode, Json<serde_json::Value>) {
    if !event.is_new_pull_request_comment() {
        return (StatusCode::OK, Json(json!({"status":"ignored"})));
    }
    let Some(command) = parse_comment_command(event.body(), &state.config.comment_prefix) else {
        return (StatusCode::OK, Json(json!({"status":"ignored"})));
    };
    let Some(base_repo) = Repo::from_full_name(&event.repository.full_name) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "parse_failed",
            format!(
                "repository full name {:?} is not owner/name",
                event.repository.full_name
            ),
        );
    };
    let pull_num = event.issue.number;

    let command = match command {
        Ok(command) => command,
        Err(error) => {
            tracing::info!(repo = %base_repo.full_name, pull = pull_num, error = %error, "rejected comment command");
            let body = format!("```\nError: {error}\n```");
            if let Err(error) = state
                .client
                .create_comment(&base_repo, pull_num, &body)
                .await
            {
                tracing::warn!(error = %format!("{error:#}"), "failed to comment parse error");
            }
            return (StatusCode::OK, Json(json!({"status":"rejected"})));
        }
    };

    tracing::info!(
        repo = %base_repo.full_name,
        pull = pull_num,
        command = %command.name,
        environment = %command.environment,
        "dispatching comment command"
    );
    let ctx = CommandContext::new(
        base_repo,
        PullRequest::numbered(pull_num),
        User {
            login: event.author().to_string(),
        },
        command,
    );
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move { dispatcher.execute_command(ctx).await });
    (StatusCode::OK, Json(json!({"status":"accepted"})))
}

async fn handle_pull_request_event(
    state: &WebhookServerState,
    event: PullRequestEvent,
) -> (StatusCode, Json<serde_json::Value>) {
    if !event.is_closed() {
        return (StatusCode::OK, Json(json!({"status":"ignored"})));
    }
    let Some(repo) = Repo::from_full_name(&event.repository.full_name) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "parse_failed",
            format!(
                "repository full name {:?} is not owner/name",
                event.repository.full_name
            ),
        );
    };
    let pull = PullRequest::numbered(event.number);
    match state.workspace.delete(&repo, &pull).await {
        Ok(()) => {
            tracing::info!(repo = %repo.full_name, pull = pull.num, "deleted workspaces of closed pull request");
            (StatusCode::OK, Json(json!({"status":"cleaned"})))
        }
        Err(error) => {
            let error = anyhow::Error::new(error);
            tracing::error!(repo = %repo.full_name, pull = pull.num, error = %format!("{error:#}"), "workspace cleanup failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "cleanup_failed",
                format!("{error:#}"),
            )
        }
    }
}
