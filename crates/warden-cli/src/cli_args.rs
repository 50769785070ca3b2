use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:3001";
pub const DEFAULT_WARNING_MESSAGE: &str =
    "警告：请不要发送违禁词！\n如有误删，请及时联系管理员处理。";
pub const DEFAULT_VIDEO_WARNING_MESSAGE: &str = "为防止广告，本群禁止发送视频。";

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "warden",
    about = "Event-driven moderation and command agent for OneBot-compatible group-chat gateways",
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "WARDEN_GATEWAY_URL",
        default_value = DEFAULT_GATEWAY_URL,
        help = "WebSocket address of the bot gateway."
    )]
    pub gateway_url: String,

    #[arg(
        long,
        env = "WARDEN_TOKEN",
        help = "Optional gateway authentication token, sent once per connection."
    )]
    pub token: Option<String>,

    #[arg(
        long = "admin-id",
        env = "WARDEN_ADMIN_IDS",
        value_delimiter = ',',
        help = "Sender ids with full privilege regardless of group role. Repeat the flag or comma-separate."
    )]
    pub admin_ids: Vec<i64>,

    #[arg(
        long,
        env = "WARDEN_DATA_DIR",
        default_value = "warden-data",
        help = "Directory holding forbidden_words.txt, enabled_groups.txt, and the per-group keywords/ tree."
    )]
    pub data_dir: PathBuf,

    #[arg(
        long,
        env = "WARDEN_WARNING_MESSAGE",
        default_value = DEFAULT_WARNING_MESSAGE,
        help = "Group reply sent when a forbidden pattern matches."
    )]
    pub warning_message: String,

    #[arg(
        long,
        env = "WARDEN_VIDEO_WARNING_MESSAGE",
        default_value = DEFAULT_VIDEO_WARNING_MESSAGE,
        help = "Group reply sent when a video segment is removed."
    )]
    pub video_warning_message: String,

    #[arg(
        long,
        env = "WARDEN_RECONNECT_DELAY_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Delay before reconnecting after a gateway failure."
    )]
    pub reconnect_delay_ms: u64,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn unit_defaults_cover_gateway_and_data_dir() {
        let cli = Cli::parse_from(["warden"]);
        assert_eq!(cli.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(cli.data_dir, PathBuf::from("warden-data"));
        assert!(cli.admin_ids.is_empty());
        assert_eq!(cli.reconnect_delay_ms, 5_000);
        assert_eq!(cli.warning_message, DEFAULT_WARNING_MESSAGE);
    }

    #[test]
    fn unit_admin_ids_accept_repeats_and_comma_lists() {
        let cli = Cli::parse_from(["warden", "--admin-id", "10", "--admin-id", "20,30"]);
        assert_eq!(cli.admin_ids, vec![10, 20, 30]);
    }

    #[test]
    fn unit_reconnect_delay_rejects_zero() {
        let result = Cli::try_parse_from(["warden", "--reconnect-delay-ms", "0"]);
        assert!(result.is_err());
    }
}
