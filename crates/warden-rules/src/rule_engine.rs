//! Per-event rule dispatcher.
//!
//! One event in, zero or more outbound actions out. Rules run in a fixed
//! order and are independent: a failure inside one rule is logged and
//! counted, and every later rule still runs, so a single bad command or a
//! storage failure never takes the event loop down.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use warden_gateway::{
    ActionSink, GroupMessage, InboundEvent, OutboundAction, PrivateMessage, SenderIdentity,
};
use warden_moderation::{AddOutcome, DeleteOutcome, KeywordStore, PatternStore, StoreError};

use crate::command_grammar::{
    is_recall_command, is_test_command, parse_api_command, recognize_prefix_command,
    split_keyword_pair, PrefixCommandKind, PrefixCommandMatch, PrivilegeTier,
};

/// Mute applied to the sender of a forbidden-pattern message.
pub const FORBIDDEN_PATTERN_MUTE_SECONDS: u64 = 60;
/// Ban duration assumed when no duration segment follows the at-mention.
pub const DEFAULT_BAN_MINUTES: u64 = 1;

pub const TEST_SUCCESS_REPLY: &str = "测试成功";
pub const KEYWORD_USAGE_REPLY: &str =
    "格式错误，请使用【关键词】:【回复】格式\n例如：addkeyword 关键词:回复";
pub const KEYWORD_STORE_FAILURE_REPLY: &str = "关键词操作失败，请稍后重试";

#[derive(Debug, Clone)]
/// Immutable rule configuration assembled at startup.
pub struct RuleEngineConfig {
    pub admin_ids: Vec<i64>,
    pub warning_message: String,
    pub video_warning_message: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Per-event dispatch counters surfaced in runtime cycle logs.
pub struct DispatchReport {
    pub actions_emitted: usize,
    pub rule_errors: usize,
}

pub struct RuleEngine {
    config: RuleEngineConfig,
    patterns: Arc<PatternStore>,
    keywords: KeywordStore,
}

impl RuleEngine {
    pub fn new(
        config: RuleEngineConfig,
        patterns: Arc<PatternStore>,
        keywords: KeywordStore,
    ) -> Self {
        Self {
            config,
            patterns,
            keywords,
        }
    }

    /// Evaluates the rule set against one classified event.
    pub async fn dispatch(&self, event: &InboundEvent, sink: &mut dyn ActionSink) -> DispatchReport {
        let mut report = DispatchReport::default();
        match event {
            InboundEvent::Group(message) => {
                self.dispatch_group(message, sink, &mut report).await;
            }
            InboundEvent::Private(message) => {
                self.dispatch_private(message, sink, &mut report).await;
            }
            InboundEvent::Heartbeat | InboundEvent::Other { .. } => {}
        }
        report
    }

    async fn dispatch_group(
        &self,
        message: &GroupMessage,
        sink: &mut dyn ActionSink,
        report: &mut DispatchReport,
    ) {
        let sender = message.sender();

        let result = self.apply_test(message, &sender, sink).await;
        record_rule_outcome("test", message.group_id, result, report);

        // At most one prefix command matches; keyword mutations are held
        // back so the moderation block keeps its place in emission order.
        let mut keyword_command: Option<PrefixCommandMatch<'_>> = None;
        if let Some(matched) = recognize_prefix_command(&message.raw_text) {
            if !is_authorized(&sender, matched.tier, &self.config.admin_ids) {
                tracing::debug!(
                    "ignoring unauthorized command: rule={} group_id={} user_id={} role={}",
                    matched.kind.as_str(),
                    message.group_id,
                    message.user_id,
                    message.role.as_str()
                );
            } else {
                match matched.kind {
                    PrefixCommandKind::WholeMute => {
                        let result = self.apply_whole_ban(message, true, sink).await;
                        record_rule_outcome("whole-mute", message.group_id, result, report);
                    }
                    PrefixCommandKind::WholeUnmute => {
                        let result = self.apply_whole_ban(message, false, sink).await;
                        record_rule_outcome("whole-unmute", message.group_id, result, report);
                    }
                    PrefixCommandKind::Kick => {
                        let result = self.apply_kick(message, sink).await;
                        record_rule_outcome("kick", message.group_id, result, report);
                    }
                    PrefixCommandKind::Ban => {
                        let result = self.apply_ban(message, sink).await;
                        record_rule_outcome("ban", message.group_id, result, report);
                    }
                    PrefixCommandKind::Unban => {
                        let result = self.apply_unban(message, sink).await;
                        record_rule_outcome("unban", message.group_id, result, report);
                    }
                    PrefixCommandKind::AddKeyword | PrefixCommandKind::DeleteKeyword => {
                        keyword_command = Some(matched);
                    }
                }
            }
        }

        let result = self.apply_recall(message, &sender, sink).await;
        record_rule_outcome("recall", message.group_id, result, report);

        if self.patterns.is_group_enabled(message.group_id) {
            let result = self.apply_video_filter(message, sink).await;
            record_rule_outcome("video-filter", message.group_id, result, report);

            let result = self.apply_pattern_filter(message, sink).await;
            record_rule_outcome("pattern-filter", message.group_id, result, report);
        }

        if let Some(matched) = keyword_command {
            let result = match matched.kind {
                PrefixCommandKind::AddKeyword => {
                    self.apply_add_keyword(message, matched.remainder, sink).await
                }
                _ => {
                    self.apply_delete_keyword(message, matched.remainder, sink)
                        .await
                }
            };
            record_rule_outcome(matched.kind.as_str(), message.group_id, result, report);
        }

        let result = self.apply_keyword_reply(message, sink).await;
        record_rule_outcome("keyword-reply", message.group_id, result, report);
    }

    async fn apply_test(
        &self,
        message: &GroupMessage,
        sender: &SenderIdentity,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        if !is_test_command(&message.raw_text) {
            return Ok(0);
        }
        if !sender.is_allowlisted(&self.config.admin_ids) {
            tracing::debug!(
                "ignoring test command from non-allowlisted sender: user_id={}",
                message.user_id
            );
            return Ok(0);
        }
        sink.submit(OutboundAction::send_group_msg(
            message.group_id,
            TEST_SUCCESS_REPLY,
        ))
        .await?;
        Ok(1)
    }

    async fn apply_whole_ban(
        &self,
        message: &GroupMessage,
        enable: bool,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        sink.submit(OutboundAction::set_group_whole_ban(message.group_id, enable))
            .await?;
        let notice = if enable {
            format!("已开启群 {} 的全员禁言。", message.group_id)
        } else {
            format!("已解除群 {} 的全员禁言。", message.group_id)
        };
        sink.submit(OutboundAction::send_group_msg(message.group_id, &notice))
            .await?;
        Ok(2)
    }

    async fn apply_kick(&self, message: &GroupMessage, sink: &mut dyn ActionSink) -> Result<usize> {
        let Some(target) = message.first_at_target() else {
            tracing::debug!(
                "kick command without at-mention: group_id={}",
                message.group_id
            );
            return Ok(0);
        };
        sink.submit(OutboundAction::set_group_kick(message.group_id, target))
            .await?;
        sink.submit(OutboundAction::send_group_msg(
            message.group_id,
            &format!("已踢出用户 {target}。"),
        ))
        .await?;
        Ok(2)
    }

    async fn apply_ban(&self, message: &GroupMessage, sink: &mut dyn ActionSink) -> Result<usize> {
        let Some(target) = message.first_at_target() else {
            tracing::debug!(
                "ban command without at-mention: group_id={}",
                message.group_id
            );
            return Ok(0);
        };
        let minutes = match message.text_after_first_at().map(str::trim) {
            Some(text) if !text.is_empty() => text
                .parse::<u64>()
                .with_context(|| format!("invalid ban duration '{text}'"))?,
            _ => DEFAULT_BAN_MINUTES,
        };
        sink.submit(OutboundAction::set_group_ban(
            message.group_id,
            target,
            minutes.saturating_mul(60),
        ))
        .await?;
        Ok(1)
    }

    async fn apply_unban(
        &self,
        message: &GroupMessage,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        let Some(target) = message.first_at_target() else {
            tracing::debug!(
                "unban command without at-mention: group_id={}",
                message.group_id
            );
            return Ok(0);
        };
        sink.submit(OutboundAction::set_group_ban(message.group_id, target, 0))
            .await?;
        Ok(1)
    }

    async fn apply_recall(
        &self,
        message: &GroupMessage,
        sender: &SenderIdentity,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        if !is_recall_command(&message.raw_text) {
            return Ok(0);
        }
        if !sender.is_privileged(&self.config.admin_ids) {
            tracing::debug!(
                "ignoring recall command from unauthorized sender: user_id={}",
                message.user_id
            );
            return Ok(0);
        }
        let target_id = message
            .leading_reply_id()
            .ok_or_else(|| anyhow!("recall command without a quoted message id"))?;
        sink.submit(OutboundAction::delete_msg(target_id)).await?;
        Ok(1)
    }

    async fn apply_video_filter(
        &self,
        message: &GroupMessage,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        if !message.has_video_segment() {
            return Ok(0);
        }
        tracing::info!(
            "video segment blocked: group_id={} user_id={} message_id={}",
            message.group_id,
            message.user_id,
            message.message_id
        );
        sink.submit(OutboundAction::delete_msg(message.message_id))
            .await?;
        sink.submit(OutboundAction::send_group_msg(
            message.group_id,
            &self.config.video_warning_message,
        ))
        .await?;
        Ok(2)
    }

    async fn apply_pattern_filter(
        &self,
        message: &GroupMessage,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        let Some(pattern) = self.patterns.find_match(&message.raw_text) else {
            return Ok(0);
        };
        tracing::info!(
            "forbidden pattern matched: group_id={} user_id={} message_id={} pattern={}",
            message.group_id,
            message.user_id,
            message.message_id,
            pattern
        );
        sink.submit(OutboundAction::delete_msg(message.message_id))
            .await?;
        sink.submit(OutboundAction::send_group_msg(
            message.group_id,
            &self.config.warning_message,
        ))
        .await?;
        sink.submit(OutboundAction::set_group_ban(
            message.group_id,
            message.user_id,
            FORBIDDEN_PATTERN_MUTE_SECONDS,
        ))
        .await?;
        Ok(3)
    }

    async fn apply_add_keyword(
        &self,
        message: &GroupMessage,
        remainder: &str,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        let Some((keyword, reply)) = split_keyword_pair(remainder) else {
            sink.submit(OutboundAction::send_group_msg(
                message.group_id,
                KEYWORD_USAGE_REPLY,
            ))
            .await?;
            return Ok(1);
        };
        let notice = match self.keywords.add(message.group_id, &keyword, &reply) {
            Ok(AddOutcome::Inserted) => {
                format!("添加关键词 {keyword} 成功，回复: {reply}")
            }
            Ok(AddOutcome::AlreadyExists { .. }) => format!("关键词 {keyword} 已存在"),
            Err(StoreError::InvalidKeyword { .. }) => KEYWORD_USAGE_REPLY.to_string(),
            Err(error) => {
                tracing::error!(
                    "keyword add failed: group_id={} keyword={} error={}",
                    message.group_id,
                    keyword,
                    error
                );
                KEYWORD_STORE_FAILURE_REPLY.to_string()
            }
        };
        sink.submit(OutboundAction::send_group_msg(message.group_id, &notice))
            .await?;
        Ok(1)
    }

    async fn apply_delete_keyword(
        &self,
        message: &GroupMessage,
        remainder: &str,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        let keyword = remainder.trim();
        let notice = match self.keywords.delete(message.group_id, keyword) {
            Ok(DeleteOutcome::Removed) => format!("删除关键词 {keyword} 成功"),
            Ok(DeleteOutcome::NotFound) => format!("关键词 {keyword} 不存在"),
            Err(error) => {
                tracing::error!(
                    "keyword delete failed: group_id={} keyword={} error={}",
                    message.group_id,
                    keyword,
                    error
                );
                KEYWORD_STORE_FAILURE_REPLY.to_string()
            }
        };
        sink.submit(OutboundAction::send_group_msg(message.group_id, &notice))
            .await?;
        Ok(1)
    }

    async fn apply_keyword_reply(
        &self,
        message: &GroupMessage,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        let reply = match self.keywords.lookup(message.group_id, &message.raw_text) {
            Ok(Some(reply)) => reply,
            Ok(None) => return Ok(0),
            Err(error) => return Err(error.into()),
        };
        let content = format!("[CQ:at,qq={}] {}", message.user_id, reply);
        sink.submit(OutboundAction::send_group_msg(message.group_id, &content))
            .await?;
        Ok(1)
    }

    async fn dispatch_private(
        &self,
        message: &PrivateMessage,
        sink: &mut dyn ActionSink,
        report: &mut DispatchReport,
    ) {
        let result = self.apply_api_command(message, sink).await;
        record_rule_outcome("execute-api", message.user_id, result, report);
    }

    async fn apply_api_command(
        &self,
        message: &PrivateMessage,
        sink: &mut dyn ActionSink,
    ) -> Result<usize> {
        if !self.config.admin_ids.contains(&message.user_id) {
            return Ok(0);
        }
        let Some(command) = parse_api_command(&message.raw_text) else {
            return Ok(0);
        };
        if command.action.is_empty() {
            tracing::warn!(
                "dropping api command without action: user_id={}",
                message.user_id
            );
            return Ok(0);
        }
        let params = match serde_json::from_str::<Value>(&command.params_raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!(
                    "dropping api command with non-object params: user_id={} action={}",
                    message.user_id,
                    command.action
                );
                return Ok(0);
            }
            Err(error) => {
                tracing::warn!(
                    "dropping api command with invalid params JSON: user_id={} action={} error={}",
                    message.user_id,
                    command.action,
                    error
                );
                return Ok(0);
            }
        };
        tracing::info!(
            "executing api command: user_id={} action={}",
            message.user_id,
            command.action
        );
        sink.submit(OutboundAction::new(command.action, params))
            .await?;
        Ok(1)
    }
}

fn is_authorized(sender: &SenderIdentity, tier: PrivilegeTier, admin_ids: &[i64]) -> bool {
    match tier {
        PrivilegeTier::AdminAllowlist => sender.is_allowlisted(admin_ids),
        PrivilegeTier::Privileged => sender.is_privileged(admin_ids),
    }
}

fn record_rule_outcome(
    rule: &str,
    context_id: i64,
    result: Result<usize>,
    report: &mut DispatchReport,
) {
    match result {
        Ok(count) => {
            report.actions_emitted = report.actions_emitted.saturating_add(count);
        }
        Err(error) => {
            report.rule_errors = report.rule_errors.saturating_add(1);
            tracing::warn!("rule failed: rule={rule} context={context_id} error={error:#}");
        }
    }
}
