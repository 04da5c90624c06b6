//! Picks the console to open from the command line

use crate::catalog::Console;

/// Selector flags and the consoles they open
pub const SELECTORS: &[(&str, Console)] = &[
    ("-cd", Console::ChannelDisplay),
    ("-anss", Console::Anss),
    ("-md", Console::Metadata),
    ("-dbsetup", Console::DbSetup),
    ("-neicfetchconfig", Console::FetchConfig),
];

fn selector(arg: &str) -> Option<Console> {
    SELECTORS
        .iter()
        .find(|(flag, _)| *flag == arg)
        .map(|(_, console)| *console)
}

/// Returns the console named by the first selector flag, or the EDGE console
/// when there is none, with the selector removed and every other argument
/// passed through in order.
pub fn dispatch<I, S>(args: I) -> (Console, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut console = None;
    let mut passthrough = Vec::new();
    for arg in args {
        let arg = arg.into();
        if console.is_none() {
            if let Some(found) = selector(&arg) {
                console = Some(found);
                continue;
            }
        }
        passthrough.push(arg);
    }
    (console.unwrap_or(Console::EdgeConfig), passthrough)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_console() {
        let (console, rest) = dispatch(["--config", "/etc/edge.yaml"]);
        assert_eq!(console, Console::EdgeConfig);
        assert_eq!(rest, vec!["--config", "/etc/edge.yaml"]);

        let (console, rest) = dispatch(Vec::<String>::new());
        assert_eq!(console, Console::EdgeConfig);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_each_selector() {
        for (flag, expected) in SELECTORS {
            let (console, rest) = dispatch([*flag]);
            assert_eq!(console, *expected);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn test_only_first_selector_is_consumed() {
        let (console, rest) = dispatch(["-x", "-anss", "-cd", "y"]);
        assert_eq!(console, Console::Anss);
        assert_eq!(rest, vec!["-x", "-cd", "y"]);
    }
}
