//! Pure command recognizers over raw message text.
//!
//! The prefix commands are described as data: each grammar entry carries its
//! spellings, boundary requirement, and privilege tier, and the table is
//! walked in precedence order so `ban-all` resolves before `ban` and
//! `unban-all` before `unban` by construction.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeTier {
    /// Sender must be in the configured admin allowlist.
    AdminAllowlist,
    /// Allowlisted, or group role owner/admin.
    Privileged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixCommandKind {
    WholeMute,
    WholeUnmute,
    Kick,
    Ban,
    Unban,
    AddKeyword,
    DeleteKeyword,
}

impl PrefixCommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WholeMute => "whole-mute",
            Self::WholeUnmute => "whole-unmute",
            Self::Kick => "kick",
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::AddKeyword => "add-keyword",
            Self::DeleteKeyword => "delete-keyword",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PrefixSpelling {
    prefix: &'static str,
    // ASCII command words refuse an alphanumeric continuation so that
    // "banana" does not read as a ban command; CJK words and the
    // remainder-style keyword prefixes keep bare prefix semantics.
    ascii_boundary: bool,
}

#[derive(Debug, Clone, Copy)]
struct PrefixGrammar {
    kind: PrefixCommandKind,
    tier: PrivilegeTier,
    spellings: &'static [PrefixSpelling],
}

const PREFIX_GRAMMAR: &[PrefixGrammar] = &[
    PrefixGrammar {
        kind: PrefixCommandKind::WholeMute,
        tier: PrivilegeTier::Privileged,
        spellings: &[
            PrefixSpelling {
                prefix: "全员禁言",
                ascii_boundary: false,
            },
            PrefixSpelling {
                prefix: "ban-all",
                ascii_boundary: true,
            },
        ],
    },
    PrefixGrammar {
        kind: PrefixCommandKind::WholeUnmute,
        tier: PrivilegeTier::Privileged,
        spellings: &[
            PrefixSpelling {
                prefix: "全员解禁",
                ascii_boundary: false,
            },
            PrefixSpelling {
                prefix: "unban-all",
                ascii_boundary: true,
            },
        ],
    },
    PrefixGrammar {
        kind: PrefixCommandKind::Kick,
        tier: PrivilegeTier::Privileged,
        spellings: &[
            PrefixSpelling {
                prefix: "kick",
                ascii_boundary: true,
            },
            PrefixSpelling {
                prefix: "t",
                ascii_boundary: true,
            },
            PrefixSpelling {
                prefix: "踢",
                ascii_boundary: false,
            },
        ],
    },
    PrefixGrammar {
        kind: PrefixCommandKind::Ban,
        tier: PrivilegeTier::Privileged,
        spellings: &[PrefixSpelling {
            prefix: "ban",
            ascii_boundary: true,
        }],
    },
    PrefixGrammar {
        kind: PrefixCommandKind::Unban,
        tier: PrivilegeTier::Privileged,
        spellings: &[PrefixSpelling {
            prefix: "unban",
            ascii_boundary: true,
        }],
    },
    PrefixGrammar {
        kind: PrefixCommandKind::AddKeyword,
        tier: PrivilegeTier::AdminAllowlist,
        spellings: &[PrefixSpelling {
            prefix: "addkeyword",
            ascii_boundary: false,
        }],
    },
    PrefixGrammar {
        kind: PrefixCommandKind::DeleteKeyword,
        tier: PrivilegeTier::AdminAllowlist,
        spellings: &[PrefixSpelling {
            prefix: "delkeyword",
            ascii_boundary: false,
        }],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixCommandMatch<'a> {
    pub kind: PrefixCommandKind,
    pub tier: PrivilegeTier,
    /// Text after the matched prefix, untrimmed.
    pub remainder: &'a str,
}

/// First grammar entry, in table precedence order, whose prefix matches.
/// At most one prefix command matches a given text.
pub fn recognize_prefix_command(raw_text: &str) -> Option<PrefixCommandMatch<'_>> {
    for grammar in PREFIX_GRAMMAR {
        for spelling in grammar.spellings {
            if let Some(remainder) = match_prefix(raw_text, spelling) {
                return Some(PrefixCommandMatch {
                    kind: grammar.kind,
                    tier: grammar.tier,
                    remainder,
                });
            }
        }
    }
    None
}

fn match_prefix<'a>(text: &'a str, spelling: &PrefixSpelling) -> Option<&'a str> {
    let remainder = text.strip_prefix(spelling.prefix)?;
    if spelling.ascii_boundary {
        if let Some(next) = remainder.chars().next() {
            if next.is_ascii_alphanumeric() {
                return None;
            }
        }
    }
    Some(remainder)
}

pub fn is_test_command(raw_text: &str) -> bool {
    raw_text == "测试" || raw_text == "test"
}

pub fn is_recall_command(raw_text: &str) -> bool {
    raw_text.contains("recall") || raw_text.contains("撤回")
}

/// Splits an `addkeyword` remainder into `(keyword, reply)` on the first
/// `:`. The keyword is trimmed; the reply keeps everything after the
/// separator, so it may itself contain `:`.
pub fn split_keyword_pair(remainder: &str) -> Option<(String, String)> {
    let trimmed = remainder.trim();
    let (keyword, reply) = trimmed.split_once(':')?;
    Some((keyword.trim().to_string(), reply.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCommand {
    pub action: String,
    pub params_raw: String,
}

const API_COMMAND_MARKERS: &[(&str, &str)] = &[("执行API", "参数"), ("execute API", "params")];

/// Extracts `<action>` and the raw parameter blob from the private-chat
/// API-execution grammar. The action part runs up to the last occurrence of
/// the params marker, mirroring a greedy two-capture split.
pub fn parse_api_command(raw_text: &str) -> Option<ApiCommand> {
    for (action_marker, params_marker) in API_COMMAND_MARKERS {
        let Some(start) = raw_text.find(action_marker) else {
            continue;
        };
        let after_action = &raw_text[start + action_marker.len()..];
        let Some(params_at) = after_action.rfind(params_marker) else {
            continue;
        };
        let action = after_action[..params_at].trim().to_string();
        let params_raw = after_action[params_at + params_marker.len()..]
            .trim()
            .to_string();
        return Some(ApiCommand { action, params_raw });
    }
    None
}
