//! macOS collaborators. Everything goes through `osascript`, which is available on every macOS
//! install. The script builders are plain functions so they can be checked on any platform.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{command::run_command, ForegroundProbe, Notifier};

const OSASCRIPT: &str = "/usr/bin/osascript";

const FRONTMOST_PROCESS_SCRIPT: &str = "tell application \"System Events\" to get name of first \
                                        application process whose frontmost is true";

/// Escapes a value so it can be placed inside an AppleScript string literal.
pub fn escape_applescript_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn notification_script(title: &str, message: &str) -> String {
    format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript_string(message),
        escape_applescript_string(title)
    )
}

/// Page shown instead of a blocked site.
pub fn blocked_page_url(site: &str) -> String {
    format!("data:text/plain,{site} Blocked: Start Coding to Unlock")
}

/// Builds a script that redirects every Chrome tab whose URL contains one of `websites` to the
/// blocked page of the first matching site. Tabs already showing a placeholder are left alone.
/// Chrome is not launched if it isn't running.
pub fn chrome_block_script(websites: &[String]) -> String {
    let mut branches = String::new();
    for (index, site) in websites.iter().enumerate() {
        let keyword = if index == 0 { "if" } else { "else if" };
        branches.push_str(&format!(
            "                    {keyword} u contains \"{}\" then\n                        set URL of t to \"{}\"\n",
            escape_applescript_string(site),
            escape_applescript_string(&blocked_page_url(site)),
        ));
    }

    format!(
        r#"if application "Google Chrome" is running then
    tell application "Google Chrome"
        repeat with w in windows
            repeat with t in tabs of w
                set u to URL of t
                if u does not start with "data:" then
{branches}                    end if
                end if
            end repeat
        end repeat
    end tell
end if"#
    )
}

pub struct AppleScriptProbe;

#[async_trait]
impl ForegroundProbe for AppleScriptProbe {
    #[instrument(skip(self))]
    async fn current_foreground_app(&mut self) -> Result<String> {
        run_command(OSASCRIPT, &["-e", FRONTMOST_PROCESS_SCRIPT]).await
    }
}

pub struct AppleScriptNotifier;

#[async_trait]
impl Notifier for AppleScriptNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        run_command(OSASCRIPT, &["-e", &notification_script(title, message)]).await?;
        debug!("Notification sent - {title}: {message}");
        Ok(())
    }
}

pub struct ChromeTabBlocker;

impl ChromeTabBlocker {
    pub async fn block(&self, websites: &[String]) -> Result<()> {
        if websites.is_empty() {
            return Ok(());
        }
        run_command(OSASCRIPT, &["-e", &chrome_block_script(websites)]).await?;
        debug!("Tabs matching {websites:?} blocked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{blocked_page_url, chrome_block_script, escape_applescript_string, notification_script};

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(
            escape_applescript_string(r#"say "hi" \ bye"#),
            r#"say \"hi\" \\ bye"#
        );
    }

    #[test]
    fn notification_script_escapes_both_parts() {
        assert_eq!(
            notification_script("Time's Up!", "Stop \"watching\""),
            r#"display notification "Stop \"watching\"" with title "Time's Up!""#
        );
    }

    #[test]
    fn block_script_has_one_branch_per_site_in_order() {
        let script = chrome_block_script(&["youtube.com".into(), "reddit.com".into()]);

        let youtube = script.find("if u contains \"youtube.com\" then").unwrap();
        let reddit = script.find("else if u contains \"reddit.com\" then").unwrap();
        assert!(youtube < reddit);
        assert!(script.contains(&format!("set URL of t to \"{}\"", blocked_page_url("reddit.com"))));
        assert!(script.starts_with("if application \"Google Chrome\" is running then"));
        assert_eq!(script.matches("end if").count(), 3);
    }

    #[test]
    fn blocked_page_names_the_site() {
        assert_eq!(
            blocked_page_url("youtube.com"),
            "data:text/plain,youtube.com Blocked: Start Coding to Unlock"
        );
    }
}
