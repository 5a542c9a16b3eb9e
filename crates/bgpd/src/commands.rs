// Copyright (C) 2024-present The bgpcore Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Line oriented command surface: `ip as-path access-list`, `dump bgp`,
//! `debug bgp` and their `show` counterparts, applied to the shared engines.

use bgpcore_aspath_filter::{AsPathFilterEngine, AsPathFilterError, FilterAction};
use bgpcore_bgp_speaker::{
    debug::{DebugError, DebugFlags},
    DebugScope, DebugState,
};
use bgpcore_mrt::{DumpConfig, DumpError, DumpKind, DumpManager};
use std::{
    str::FromStr,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::debug;

/// Where a command is entered. Config mode changes persist in the saved
/// configuration, exec mode changes last for the session.
#[derive(Debug, Copy, Clone, Eq, PartialEq, strum_macros::Display)]
pub enum CommandMode {
    Config,
    Exec,
}

impl From<CommandMode> for DebugScope {
    fn from(value: CommandMode) -> Self {
        match value {
            CommandMode::Config => DebugScope::Config,
            CommandMode::Exec => DebugScope::Terminal,
        }
    }
}

/// Text printed back to the operator, empty for most configuration commands
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct CommandOutput(pub String);

impl CommandOutput {
    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum CommandError {
    #[error("BGP_API_SET_ERR_REGEXP_COMPILE_FAIL: {0}")]
    RegexpCompileFail(String),

    #[error("BGP_API_SET_ERR_UNKNOWN_OBJECT: {0}")]
    UnknownObject(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid {what}: {value}")]
    InvalidArgument { what: &'static str, value: String },

    #[error("command is only accepted in config mode: {0}")]
    ConfigOnly(String),

    #[error(transparent)]
    Dump(DumpError),

    #[error(transparent)]
    Debug(#[from] DebugError),
}

impl CommandError {
    /// API error name of the failures the protocol layer defines one for
    pub const fn api_error(&self) -> Option<&'static str> {
        match self {
            Self::RegexpCompileFail(_) => Some("BGP_API_SET_ERR_REGEXP_COMPILE_FAIL"),
            Self::UnknownObject(_) => Some("BGP_API_SET_ERR_UNKNOWN_OBJECT"),
            _ => None,
        }
    }
}

impl From<AsPathFilterError> for CommandError {
    fn from(value: AsPathFilterError) -> Self {
        match value {
            AsPathFilterError::RegexCompile { .. } => Self::RegexpCompileFail(value.to_string()),
            AsPathFilterError::UnknownObject { .. } => Self::UnknownObject(value.to_string()),
        }
    }
}

impl From<DumpError> for CommandError {
    fn from(value: DumpError) -> Self {
        match value {
            DumpError::NotConfigured(_) => Self::UnknownObject(value.to_string()),
            other => Self::Dump(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandHandler {
    filters: Arc<RwLock<AsPathFilterEngine>>,
    dumps: DumpManager,
    debug: Arc<DebugState>,
}

impl CommandHandler {
    pub const fn new(
        filters: Arc<RwLock<AsPathFilterEngine>>,
        dumps: DumpManager,
        debug: Arc<DebugState>,
    ) -> Self {
        Self {
            filters,
            dumps,
            debug,
        }
    }

    pub fn filters(&self) -> RwLockReadGuard<'_, AsPathFilterEngine> {
        self.filters.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn filters_mut(&self) -> RwLockWriteGuard<'_, AsPathFilterEngine> {
        self.filters.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub const fn dumps(&self) -> &DumpManager {
        &self.dumps
    }

    pub fn debug_state(&self) -> &DebugState {
        &self.debug
    }

    /// Run one command line
    pub fn execute(&self, mode: CommandMode, line: &str) -> Result<CommandOutput, CommandError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let config_only = || {
            if mode == CommandMode::Config {
                Ok(())
            } else {
                Err(CommandError::ConfigOnly(line.trim().to_string()))
            }
        };
        match words.as_slice() {
            ["ip", "as-path", "access-list", name, action, regex @ ..] if !regex.is_empty() => {
                config_only()?;
                let action = parse_action(action)?;
                self.add_filter(name, action, &regex.join(" "))
            }
            ["no", "ip", "as-path", "access-list", name, action, regex @ ..]
                if !regex.is_empty() =>
            {
                config_only()?;
                let action = parse_action(action)?;
                self.delete_filter(name, action, &regex.join(" "))
            }
            ["no", "ip", "as-path", "access-list", name] => {
                config_only()?;
                self.filters_mut().delete_list(name)?;
                self.log_filter_change(name, "deleted");
                Ok(CommandOutput::default())
            }
            ["show", "ip", "as-path-access-list"] => {
                Ok(CommandOutput(self.filters().show(None)))
            }
            ["show", "ip", "as-path-access-list", name] => {
                let filters = self.filters();
                if filters.lookup(name).is_none() {
                    return Err(AsPathFilterError::UnknownObject {
                        list: name.to_string(),
                    }
                    .into());
                }
                Ok(CommandOutput(filters.show(Some(*name))))
            }
            ["dump", "bgp", kind, path] => {
                config_only()?;
                self.dumps.set(DumpConfig::new(parse_kind(kind)?, path, None)?)?;
                Ok(CommandOutput::default())
            }
            ["dump", "bgp", kind, path, interval] => {
                config_only()?;
                self.dumps
                    .set(DumpConfig::new(parse_kind(kind)?, path, Some(*interval))?)?;
                Ok(CommandOutput::default())
            }
            ["no", "dump", "bgp", kind, ..] => {
                config_only()?;
                self.dumps.unset(parse_kind(kind)?)?;
                Ok(CommandOutput::default())
            }
            ["show", "dump", "bgp"] => Ok(CommandOutput(self.show_dumps())),
            ["debug", "bgp", category @ ..] => {
                let flags = DebugFlags::parse_category(category)?;
                self.debug.enable(mode.into(), flags);
                Ok(CommandOutput::default())
            }
            ["no", "debug", "bgp", category @ ..] | ["undebug", "bgp", category @ ..] => {
                let flags = DebugFlags::parse_category(category)?;
                self.debug.disable(mode.into(), flags);
                Ok(CommandOutput::default())
            }
            ["no", "debug", ..] => Err(CommandError::UnknownCommand(line.trim().to_string())),
            ["show", "debugging", "bgp"] => Ok(CommandOutput(self.debug.show())),
            ["show", "running-config"] => Ok(CommandOutput(self.running_config())),
            _ => Err(CommandError::UnknownCommand(line.trim().to_string())),
        }
    }

    fn add_filter(
        &self,
        name: &str,
        action: FilterAction,
        regex: &str,
    ) -> Result<CommandOutput, CommandError> {
        self.filters_mut().add_filter(name, regex, action)?;
        self.log_filter_change(name, "updated");
        Ok(CommandOutput::default())
    }

    fn delete_filter(
        &self,
        name: &str,
        action: FilterAction,
        regex: &str,
    ) -> Result<CommandOutput, CommandError> {
        self.filters_mut().delete_filter(name, regex, action)?;
        self.log_filter_change(name, "updated");
        Ok(CommandOutput::default())
    }

    fn log_filter_change(&self, name: &str, what: &str) {
        if self.debug.is_on(DebugFlags::FILTERS) {
            debug!("as-path access-list {name} {what}");
        }
    }

    fn show_dumps(&self) -> String {
        let mut out = String::new();
        for config in self.dumps.configs() {
            out.push_str(&format!("{:<12}{}", config.kind().to_string(), config.path()));
            if let Some(interval) = config.interval() {
                out.push_str(&format!(" every {}s", interval.as_secs()));
            }
            out.push('\n');
        }
        out
    }

    /// Debug lines, then AS-path lists, then dumps
    pub fn running_config(&self) -> String {
        let mut out = self.debug.config_write();
        if !out.is_empty() {
            out.push_str("!\n");
        }
        out.push_str(&self.filters().config_write());
        let dumps = self.dumps.config_write();
        if !dumps.is_empty() {
            out.push_str(&dumps);
            out.push_str("!\n");
        }
        out
    }
}

fn parse_action(text: &str) -> Result<FilterAction, CommandError> {
    FilterAction::from_str(text).map_err(|_| CommandError::InvalidArgument {
        what: "action",
        value: text.to_string(),
    })
}

fn parse_kind(text: &str) -> Result<DumpKind, CommandError> {
    DumpKind::from_str(text).map_err(|_| CommandError::InvalidArgument {
        what: "dump kind",
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgpcore_mrt::interval::IntervalError;
    use rstest::rstest;

    fn handler() -> CommandHandler {
        CommandHandler::new(
            Arc::new(RwLock::new(AsPathFilterEngine::new())),
            DumpManager::new(None),
            Arc::new(DebugState::default()),
        )
    }

    fn run(handler: &CommandHandler, line: &str) -> String {
        handler.execute(CommandMode::Config, line).unwrap().0
    }

    #[test]
    fn test_as_path_access_list() {
        let handler = handler();
        run(&handler, "ip as-path access-list ISP deny _65001_");
        run(&handler, "ip as-path access-list 10 permit ^65000 65001$");
        run(&handler, "ip as-path access-list ISP permit .*");
        assert_eq!(
            run(&handler, "show ip as-path-access-list"),
            "AS path access list 10\n    permit ^65000 65001$\nAS path access list ISP\n    deny _65001_\n    permit .*\n"
        );
        assert_eq!(
            run(&handler, "show ip as-path-access-list 10"),
            "AS path access list 10\n    permit ^65000 65001$\n"
        );

        run(&handler, "no ip as-path access-list ISP deny _65001_");
        assert_eq!(
            run(&handler, "show ip as-path-access-list ISP"),
            "AS path access list ISP\n    permit .*\n"
        );
        run(&handler, "no ip as-path access-list ISP");
        let err = handler
            .execute(CommandMode::Config, "show ip as-path-access-list ISP")
            .unwrap_err();
        assert_eq!(err.api_error(), Some("BGP_API_SET_ERR_UNKNOWN_OBJECT"));
    }

    #[test]
    fn test_as_path_errors() {
        let handler = handler();
        let err = handler
            .execute(CommandMode::Config, "ip as-path access-list 1 permit (65001")
            .unwrap_err();
        assert!(matches!(err, CommandError::RegexpCompileFail(_)));
        assert_eq!(err.api_error(), Some("BGP_API_SET_ERR_REGEXP_COMPILE_FAIL"));
        assert!(handler.filters().is_empty());

        let err = handler
            .execute(CommandMode::Config, "no ip as-path access-list 1 permit .*")
            .unwrap_err();
        assert_eq!(err.api_error(), Some("BGP_API_SET_ERR_UNKNOWN_OBJECT"));
        let err = handler
            .execute(CommandMode::Config, "no ip as-path access-list 1")
            .unwrap_err();
        assert_eq!(err.api_error(), Some("BGP_API_SET_ERR_UNKNOWN_OBJECT"));

        let err = handler
            .execute(CommandMode::Config, "ip as-path access-list 1 allow .*")
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::InvalidArgument {
                what: "action",
                value: "allow".to_string()
            }
        );
        assert_eq!(err.api_error(), None);
    }

    #[test]
    fn test_config_only() {
        let handler = handler();
        let err = handler
            .execute(CommandMode::Exec, "ip as-path access-list 1 permit .*")
            .unwrap_err();
        assert!(matches!(err, CommandError::ConfigOnly(_)));
        let err = handler
            .execute(CommandMode::Exec, "dump bgp all /tmp/bgp")
            .unwrap_err();
        assert!(matches!(err, CommandError::ConfigOnly(_)));
        assert!(handler
            .execute(CommandMode::Exec, "show ip as-path-access-list")
            .is_ok());
    }

    #[test]
    fn test_debug_scopes() {
        let handler = handler();
        run(&handler, "debug bgp fsm");
        handler
            .execute(CommandMode::Exec, "debug bgp updates in")
            .unwrap();
        assert_eq!(
            run(&handler, "show debugging bgp"),
            "BGP debugging status:\n  BGP updates in debugging is on\n  BGP fsm debugging is on\n"
        );
        assert_eq!(run(&handler, "show running-config"), "debug bgp fsm\n!\n");

        handler
            .execute(CommandMode::Exec, "undebug bgp updates in")
            .unwrap();
        run(&handler, "no debug bgp fsm");
        assert!(handler.debug_state().flags().is_empty());
    }

    #[rstest]
    #[case("debug bgp")]
    #[case("debug bgp everything")]
    #[case("no debug bgp updates sideways")]
    fn test_debug_unknown_category(#[case] line: &str) {
        let err = handler().execute(CommandMode::Config, line).unwrap_err();
        assert!(matches!(err, CommandError::Debug(_)));
    }

    #[rstest]
    #[case("dump bgp all /tmp/bgp 1d", CommandError::Dump(DumpError::Interval(IntervalError::Malformed("1d".to_string()))))]
    #[case("dump bgp tables /tmp/bgp", CommandError::InvalidArgument { what: "dump kind", value: "tables".to_string() })]
    #[case("no dump bgp updates", CommandError::UnknownObject("dump bgp updates is not configured".to_string()))]
    #[case("clear ip bgp *", CommandError::UnknownCommand("clear ip bgp *".to_string()))]
    fn test_command_errors(#[case] line: &str, #[case] expected: CommandError) {
        assert_eq!(
            handler().execute(CommandMode::Config, line),
            Err(expected)
        );
    }

    #[tokio::test]
    async fn test_dump_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("updates.%Y").display().to_string();
        let handler = handler();
        run(&handler, &format!("dump bgp updates {path} 1h30m"));
        assert!(handler.dumps().is_configured(DumpKind::Updates));
        assert_eq!(
            run(&handler, "show dump bgp"),
            format!("updates     {path} every 5400s\n")
        );
        assert_eq!(
            run(&handler, "show running-config"),
            format!("dump bgp updates {path} 1h30m\n!\n")
        );
        run(&handler, "no dump bgp updates");
        assert!(!handler.dumps().is_configured(DumpKind::Updates));
        handler.dumps().shutdown().await;
    }
}
