use std::fmt;

/// Value attached to a command-line flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Flag given without a value (e.g. `--clamp-mss-to-pmtu`)
    Flag,
    Text(String),
}

impl ArgValue {
    /// Text of the value; boolean flags read as `"true"`
    pub fn as_str(&self) -> &str {
        match self {
            ArgValue::Flag => "true",
            ArgValue::Text(text) => text,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Flag => None,
            ArgValue::Text(text) => Some(text),
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, ArgValue::Flag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdArg {
    pub flag: String,
    pub value: ArgValue,
}

impl fmt::Display for CmdArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ArgValue::Flag => write!(f, "{}", self.flag),
            ArgValue::Text(text) => write!(f, "{} {}", self.flag, text),
        }
    }
}

/// Ordered flag/value pairs of one rule line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdArgs {
    args: Vec<CmdArg>,
}

impl CmdArgs {
    /// Find the first pair whose flag matches either spelling.
    ///
    /// Either form may be empty for flags iptables only knows in one form
    /// (`--comment` has no short form, `-A` no long form).
    pub fn find(&self, short_form: &str, long_form: &str) -> Option<&CmdArg> {
        self.args.iter().find(|arg| {
            (!short_form.is_empty() && arg.flag == short_form)
                || (!long_form.is_empty() && arg.flag == long_form)
        })
    }

    /// Value of the first matching flag, or `""` when it is not present
    pub fn value_of(&self, short_form: &str, long_form: &str) -> &str {
        self.find(short_form, long_form)
            .map(|arg| arg.value.as_str())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = &CmdArg> {
        self.args.iter()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl<'a> IntoIterator for &'a CmdArgs {
    type Item = &'a CmdArg;
    type IntoIter = std::slice::Iter<'a, CmdArg>;

    fn into_iter(self) -> Self::IntoIter {
        self.args.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between pairs, waiting for the next flag
    Idle,
    /// Collecting unquoted value words
    Value,
    /// Inside a `"..."` value that spans several words
    Quoted,
}

struct Builder<'a> {
    args: Vec<CmdArg>,
    flag: Option<&'a str>,
    words: Vec<&'a str>,
}

impl<'a> Builder<'a> {
    fn open(&mut self, flag: &'a str) {
        self.flag = Some(flag);
        self.words.clear();
    }

    fn close(&mut self) {
        let Some(flag) = self.flag else {
            self.words.clear();
            return;
        };
        let value = if self.words.is_empty() {
            ArgValue::Flag
        } else {
            ArgValue::Text(self.words.join(" "))
        };
        self.args.push(CmdArg {
            flag: flag.to_string(),
            value,
        });
        self.words.clear();
    }
}

/// Split one `iptables-save` rule line into flag/value pairs.
///
/// Words after a flag belong to it until the next word starting with `-`.
/// A value opening with `"` keeps collecting words, dashes included, until a
/// word closes the quote. The end of the line always closes the pending pair,
/// so an unterminated quote simply runs to the end.
pub fn tokenize(line: &str) -> CmdArgs {
    let mut builder = Builder {
        args: Vec::new(),
        flag: None,
        words: Vec::new(),
    };
    let mut state = State::Idle;

    for word in line.split_whitespace() {
        match state {
            State::Quoted => {
                builder.words.push(word);
                if word.ends_with('"') {
                    builder.close();
                    state = State::Idle;
                }
            }
            State::Value | State::Idle if word.starts_with('-') => {
                if state == State::Value {
                    builder.close();
                }
                builder.open(word);
                state = State::Value;
            }
            State::Value | State::Idle => {
                if state == State::Idle {
                    // stray word after a closed quote
                    if builder.flag.is_none() {
                        tracing::trace!(word, "dropping word before first flag");
                        continue;
                    }
                    builder.words.clear();
                }
                builder.words.push(word);
                state = State::Value;
                if word.starts_with('"') {
                    if word.ends_with('"') {
                        builder.close();
                        state = State::Idle;
                    } else {
                        state = State::Quoted;
                    }
                }
            }
        }
    }

    if state != State::Idle {
        builder.close();
    }

    CmdArgs { args: builder.args }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rendered(line: &str) -> Vec<String> {
        tokenize(line).iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn reference_lines_round_trip() {
        let cases: [(&str, &[&str]); 4] = [
            (
                "-A PREROUTING -m comment --comment \"!fw3: Custom prerouting rule chain\" -j prerouting_rule",
                &[
                    "-A PREROUTING",
                    "-m comment",
                    "--comment \"!fw3: Custom prerouting rule chain\"",
                    "-j prerouting_rule",
                ],
            ),
            (
                "-A PREROUTING -i br-lan -m comment --comment \"!fw3\" -j zone_lan_prerouting",
                &[
                    "-A PREROUTING",
                    "-i br-lan",
                    "-m comment",
                    "--comment \"!fw3\"",
                    "-j zone_lan_prerouting",
                ],
            ),
            (
                "-A FORWARD -o br-wan -p tcp -m tcp --tcp-flags SYN,RST SYN -m comment --comment \"!fw3: Zone wan MTU fixing\" -j TCPMSS --clamp-mss-to-pmtu",
                &[
                    "-A FORWARD",
                    "-o br-wan",
                    "-p tcp",
                    "-m tcp",
                    "--tcp-flags SYN,RST SYN",
                    "-m comment",
                    "--comment \"!fw3: Zone wan MTU fixing\"",
                    "-j TCPMSS",
                    "--clamp-mss-to-pmtu",
                ],
            ),
            (
                "-A zone_lan_postrouting -s 10.0.0.0/16 -d 10.0.0.110/32 -p udp -m udp --dport 58444 -j SNAT --to-source 10.0.0.1 -m comment --comment \"!fw3\"",
                &[
                    "-A zone_lan_postrouting",
                    "-s 10.0.0.0/16",
                    "-d 10.0.0.110/32",
                    "-p udp",
                    "-m udp",
                    "--dport 58444",
                    "-j SNAT",
                    "--to-source 10.0.0.1",
                    "-m comment",
                    "--comment \"!fw3\"",
                ],
            ),
        ];

        for (line, expected) in cases {
            assert_eq!(rendered(line), expected, "line: {}", line);
        }
    }

    #[test]
    fn quoted_value_keeps_single_spacing() {
        let args = tokenize("-A X --comment \"a b c\"");
        assert_eq!(args.len(), 2);
        assert_eq!(args.value_of("", "--comment"), "\"a b c\"");
    }

    #[test]
    fn quoted_value_swallows_dashes() {
        let args = tokenize("--comment \"drop -j ACCEPT here\" -j DROP");
        assert_eq!(args.len(), 2);
        assert_eq!(args.value_of("", "--comment"), "\"drop -j ACCEPT here\"");
        assert_eq!(args.value_of("-j", "--jump"), "DROP");
    }

    #[test]
    fn flag_followed_by_flag_is_boolean() {
        let args = tokenize("-A INPUT --syn -j DROP");
        let collected: Vec<_> = args.iter().cloned().collect();
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[1].flag, "--syn");
        assert!(collected[1].value.is_flag());
        assert_eq!(collected[1].value.as_str(), "true");
        assert_eq!(collected[2].flag, "-j");
        assert_eq!(collected[2].value.as_text(), Some("DROP"));
    }

    #[test]
    fn trailing_flag_is_boolean() {
        let args = tokenize("-A FORWARD -j TCPMSS --clamp-mss-to-pmtu");
        let last = args.iter().last().unwrap();
        assert_eq!(last.flag, "--clamp-mss-to-pmtu");
        assert!(last.value.is_flag());
    }

    #[test]
    fn unterminated_quote_closes_at_end_of_line() {
        let args = tokenize("-A INPUT -j LOG --comment \"never closed -x y");
        assert_eq!(args.len(), 3);
        assert_eq!(args.value_of("", "--comment"), "\"never closed -x y");
    }

    #[test]
    fn lookup_accepts_either_spelling() {
        let args = tokenize("-A INPUT --in-interface eth0 -p udp");
        assert_eq!(args.value_of("-i", "--in-interface"), "eth0");
        assert_eq!(args.value_of("-p", "--protocol"), "udp");
        assert!(args.find("-o", "--out-interface").is_none());
        assert_eq!(args.value_of("-o", "--out-interface"), "");
    }

    #[test]
    fn empty_spelling_never_matches() {
        let args = tokenize("-A INPUT -j ACCEPT");
        assert!(args.find("", "").is_none());
    }

    #[test]
    fn stray_word_after_quote_reuses_previous_flag() {
        let args = tokenize("-A X --comment \"a\" extra -j Y");
        assert_eq!(
            args.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            vec!["-A X", "--comment \"a\"", "--comment extra", "-j Y"]
        );
    }

    #[test]
    fn words_before_first_flag_are_dropped() {
        let args = tokenize("iptables -A INPUT");
        assert_eq!(args.len(), 1);
        assert_eq!(args.value_of("-A", ""), "INPUT");
    }

    proptest! {
        #[test]
        fn one_pair_per_flag_group(
            groups in proptest::collection::vec(("[a-z]{1,8}", proptest::option::of("[a-z0-9./]{1,10}")), 1..12)
        ) {
            let line = groups
                .iter()
                .map(|(flag, value)| match value {
                    Some(value) => format!("--{} {}", flag, value),
                    None => format!("--{}", flag),
                })
                .collect::<Vec<_>>()
                .join(" ");

            let args = tokenize(&line);
            prop_assert_eq!(args.len(), groups.len());
            for (arg, (flag, value)) in args.iter().zip(&groups) {
                prop_assert_eq!(&arg.flag, &format!("--{}", flag));
                prop_assert_eq!(arg.value.as_text(), value.as_deref());
            }
        }
    }
}
