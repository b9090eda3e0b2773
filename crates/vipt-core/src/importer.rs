use tracing::{debug, warn};

use crate::error::{ImportWarning, ModelError};
use crate::model::{ChainId, NO_POLICY, RuleSpec, Ruleset, TableId};
use crate::targets::is_special_target;
use crate::tokenizer::{CmdArgs, tokenize};

/// Result of one import session
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub ruleset: Ruleset,
    pub warnings: Vec<ImportWarning>,
}

impl ImportReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Builds a [`Ruleset`] from `iptables-save` output, one line at a time.
///
/// Lines must arrive in dump order: chains have to be declared before rules
/// are appended to them. Problems are collected as [`ImportWarning`]s and
/// never abort the import.
#[derive(Debug, Default)]
pub struct Importer {
    ruleset: Ruleset,
    current_table: Option<TableId>,
    line_no: usize,
    warnings: Vec<ImportWarning>,
}

impl Importer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import_str(text: &str) -> ImportReport {
        Self::import_lines(text.lines())
    }

    pub fn import_lines<I, S>(lines: I) -> ImportReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut importer = Self::new();
        for line in lines {
            importer.process_line(line.as_ref());
        }
        importer.finish()
    }

    pub fn process_line(&mut self, line: &str) {
        self.line_no += 1;
        let line = line.trim();

        if let Some(name) = line.strip_prefix('*') {
            self.start_table(name.trim());
        } else if let Some(decl) = line.strip_prefix(':') {
            self.declare_chain(decl);
        } else if line.starts_with("-A") {
            self.append_rule(line);
        }
    }

    pub fn warnings(&self) -> &[ImportWarning] {
        &self.warnings
    }

    pub fn finish(self) -> ImportReport {
        debug!(
            tables = self.ruleset.table_count(),
            rules = self.ruleset.rule_count(),
            warnings = self.warnings.len(),
            "import finished"
        );
        ImportReport {
            ruleset: self.ruleset,
            warnings: self.warnings,
        }
    }

    fn warn(&mut self, warning: ImportWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn start_table(&mut self, name: &str) {
        if self.ruleset.table_by_name(name).is_some() {
            debug!(table = name, "re-opening table");
        }
        self.current_table = Some(self.ruleset.add_table(name));
    }

    fn declare_chain(&mut self, decl: &str) {
        let mut fields = decl.split_whitespace();
        let Some(name) = fields.next() else {
            self.warn(ImportWarning::MalformedChain { line: self.line_no });
            return;
        };
        let default_action = fields.next().unwrap_or(NO_POLICY);

        let Some(table) = self.current_table else {
            self.warn(ImportWarning::NoCurrentTable {
                line: self.line_no,
                directive: format!(":{}", name),
            });
            return;
        };

        match self.ruleset.add_chain(table, name, default_action) {
            Ok(_) => {}
            Err(ModelError::DuplicateChain { table, chain }) => {
                self.warn(ImportWarning::DuplicateChain {
                    line: self.line_no,
                    table,
                    chain,
                });
            }
            Err(err) => warn!("line {}: {}", self.line_no, err),
        }
    }

    fn append_rule(&mut self, line: &str) {
        let args = tokenize(line);
        let Some(chain_name) = args.find("-A", "").and_then(|arg| arg.value.as_text()) else {
            self.warn(ImportWarning::MissingAppendChain { line: self.line_no });
            return;
        };

        let Some(table) = self.current_table else {
            self.warn(ImportWarning::NoCurrentTable {
                line: self.line_no,
                directive: format!("-A {}", chain_name),
            });
            return;
        };

        let Some(chain) = self.ruleset.find_chain(table, chain_name) else {
            self.warn(ImportWarning::UnknownChain {
                line: self.line_no,
                table: self.ruleset.table(table).name().to_string(),
                chain: chain_name.to_string(),
            });
            return;
        };

        let spec = self.rule_spec(table, &args);
        self.ruleset.add_rule(chain, spec);
    }

    fn rule_spec(&mut self, table: TableId, args: &CmdArgs) -> RuleSpec {
        let jump_name = args.value_of("-j", "--jump");
        let jump = if is_special_target(jump_name) {
            Some(self.ruleset.add_special_chain(jump_name))
        } else {
            self.resolve_target(table, "jump", jump_name)
        };
        let goto = self.resolve_target(table, "goto", args.value_of("-g", "--goto"));

        RuleSpec {
            comment: text_of(args, "", "--comment").map(|c| c.trim_matches('"').to_string()),
            protocol: text_of(args, "-p", "--protocol").map(str::to_string),
            source: text_of(args, "-s", "--source").map(str::to_string),
            destination: text_of(args, "-d", "--destination").map(str::to_string),
            in_interface: text_of(args, "-i", "--in-interface").map(str::to_string),
            out_interface: text_of(args, "-o", "--out-interface").map(str::to_string),
            jump,
            goto,
        }
    }

    fn resolve_target(&mut self, table: TableId, flag: &'static str, name: &str) -> Option<ChainId> {
        if name.is_empty() {
            return None;
        }
        let found = self.ruleset.find_chain(table, name);
        if found.is_none() && !is_verdict(name) {
            self.warn(ImportWarning::UnresolvedTarget {
                line: self.line_no,
                table: self.ruleset.table(table).name().to_string(),
                flag,
                target: name.to_string(),
            });
        }
        found
    }
}

fn text_of<'a>(args: &'a CmdArgs, short_form: &str, long_form: &str) -> Option<&'a str> {
    args.find(short_form, long_form)
        .and_then(|arg| arg.value.as_text())
}

// Built-in verdicts end traversal and never name a chain.
fn is_verdict(name: &str) -> bool {
    ["ACCEPT", "DROP", "RETURN", "QUEUE"]
        .iter()
        .any(|verdict| verdict.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPENWRT_NAT: &str = r#"# Generated by iptables-save
*nat
:PREROUTING ACCEPT [1234:5678]
:POSTROUTING ACCEPT [0:0]
:prerouting_rule - [0:0]
:zone_lan_postrouting - [0:0]
-A PREROUTING -m comment --comment "!fw3: Custom prerouting rule chain" -j prerouting_rule
-A POSTROUTING -o br-lan -j zone_lan_postrouting
-A zone_lan_postrouting -s 10.0.0.0/16 -d 10.0.0.110/32 -p udp -m udp --dport 58444 -j SNAT --to-source 10.0.0.1 -m comment --comment "!fw3"
-A zone_lan_postrouting -o br-wan -j MASQUERADE
COMMIT
"#;

    #[test]
    fn table_chain_rule_import() {
        let report = Importer::import_str(
            "*filter\n:INPUT ACCEPT [0:0]\n:input_rule - [0:0]\n-A INPUT -j input_rule\n",
        );
        let ruleset = &report.ruleset;
        assert!(!report.has_warnings());

        let tables: Vec<_> = ruleset.tables().collect();
        assert_eq!(tables.len(), 1);
        let (filter, _) = tables[0];

        let input = ruleset.find_chain(filter, "INPUT").unwrap();
        let input_rule = ruleset.find_chain(filter, "input_rule").unwrap();
        assert_eq!(ruleset.chain(input).default_action(), "ACCEPT");
        assert_eq!(ruleset.chain(input).rules().len(), 1);
        assert_eq!(ruleset.rule_count(), 1);

        let rule = ruleset.rule(ruleset.chain(input).rules()[0]);
        assert_eq!(rule.jump_target(), Some(input_rule));
        assert_eq!(rule.goto_target(), None);
    }

    #[test]
    fn openwrt_nat_section() {
        let report = Importer::import_str(OPENWRT_NAT);
        assert!(!report.has_warnings(), "{:?}", report.warnings);

        let ruleset = &report.ruleset;
        let nat = ruleset.table_by_name("nat").unwrap();
        assert_eq!(ruleset.chains_of(nat).count(), 4);

        let zone = ruleset.find_chain(nat, "zone_lan_postrouting").unwrap();
        let rules: Vec<_> = ruleset.rules_of(zone).map(|(_, r)| r).collect();
        assert_eq!(rules.len(), 2);

        let snat = rules[0].jump_target().unwrap();
        assert!(ruleset.chain(snat).is_special());
        assert_eq!(ruleset.chain(snat).name(), "SNAT");
        assert_eq!(rules[0].source(), "10.0.0.0/16");
        assert_eq!(rules[0].destination(), "10.0.0.110/32");
        assert_eq!(rules[0].protocol(), "udp");
        assert_eq!(rules[0].comment(), Some("!fw3"));

        assert_eq!(rules[1].out_interface(), "br-wan");
        assert!(ruleset.chain(rules[1].jump_target().unwrap()).is_special());
    }

    #[test]
    fn append_to_undeclared_chain_is_skipped() {
        let report = Importer::import_str("*filter\n:INPUT ACCEPT [0:0]\n-A missing -j ACCEPT\n");
        assert_eq!(report.ruleset.rule_count(), 0);
        assert_eq!(
            report.warnings,
            vec![ImportWarning::UnknownChain {
                line: 3,
                table: "filter".into(),
                chain: "missing".into(),
            }]
        );
        let filter = report.ruleset.table_by_name("filter").unwrap();
        assert!(report.ruleset.find_chain(filter, "missing").is_none());
    }

    #[test]
    fn append_without_chain_name_is_skipped() {
        let report = Importer::import_str("*filter\n:INPUT ACCEPT\n-A\n-A -j DROP\n");
        assert_eq!(report.ruleset.rule_count(), 0);
        assert_eq!(
            report.warnings,
            vec![
                ImportWarning::MissingAppendChain { line: 3 },
                ImportWarning::MissingAppendChain { line: 4 },
            ]
        );
    }

    #[test]
    fn directives_before_table_are_skipped() {
        let report = Importer::import_str(":INPUT ACCEPT\n-A INPUT -j DROP\n");
        assert_eq!(report.ruleset.table_count(), 0);
        assert_eq!(report.warnings.len(), 2);
        assert!(matches!(
            report.warnings[0],
            ImportWarning::NoCurrentTable { line: 1, .. }
        ));
    }

    #[test]
    fn unresolved_jump_keeps_rule_without_target() {
        let report = Importer::import_str("*filter\n:FORWARD DROP\n-A FORWARD -j nowhere\n-A FORWARD -j ACCEPT\n");
        let ruleset = &report.ruleset;
        assert_eq!(ruleset.rule_count(), 2);

        let filter = ruleset.table_by_name("filter").unwrap();
        let forward = ruleset.find_chain(filter, "FORWARD").unwrap();
        assert!(ruleset.rules_of(forward).all(|(_, r)| r.jump_target().is_none()));

        // verdicts are not reported
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].line(), 3);
    }

    #[test]
    fn goto_and_jump_resolve_case_insensitively() {
        let report = Importer::import_str(
            "*filter\n:INPUT ACCEPT\n:Zone_Wan - [0:0]\n-A INPUT --goto zone_wan\n-A INPUT --jump ZONE_WAN\n",
        );
        let ruleset = &report.ruleset;
        let filter = ruleset.table_by_name("filter").unwrap();
        let input = ruleset.find_chain(filter, "input").unwrap();
        let zone = ruleset.find_chain(filter, "zone_wan").unwrap();

        let rules: Vec<_> = ruleset.rules_of(input).map(|(_, r)| r).collect();
        assert_eq!(rules[0].goto_target(), Some(zone));
        assert_eq!(rules[0].jump_target(), None);
        assert_eq!(rules[1].jump_target(), Some(zone));
    }

    #[test]
    fn special_target_needs_no_declaration() {
        let report = Importer::import_str("*nat\n:POSTROUTING ACCEPT\n-A POSTROUTING -j masquerade\n");
        assert!(!report.has_warnings());
        let ruleset = &report.ruleset;
        let nat = ruleset.table_by_name("nat").unwrap();
        let post = ruleset.find_chain(nat, "POSTROUTING").unwrap();
        let (_, rule) = ruleset.rules_of(post).next().unwrap();
        let target = ruleset.chain(rule.jump_target().unwrap());
        assert!(target.is_special());
        assert_eq!(target.table(), None);
    }

    #[test]
    fn duplicate_chain_declaration_is_reported() {
        let report = Importer::import_str("*filter\n:INPUT ACCEPT\n:input DROP\n");
        let filter = report.ruleset.table_by_name("filter").unwrap();
        assert_eq!(report.ruleset.chains_of(filter).count(), 1);
        assert!(matches!(
            report.warnings[..],
            [ImportWarning::DuplicateChain { line: 3, .. }]
        ));
    }

    #[test]
    fn blank_and_unknown_lines_are_ignored() {
        let report = Importer::import_str("\n   \n# comment\nCOMMIT\n*raw\n:PREROUTING ACCEPT\nCOMMIT\n");
        assert!(!report.has_warnings());
        assert_eq!(report.ruleset.table_count(), 1);
    }

    #[test]
    fn reopened_table_keeps_chains() {
        let report = Importer::import_str("*filter\n:INPUT ACCEPT\nCOMMIT\n*FILTER\n-A INPUT -j DROP\n");
        assert!(!report.has_warnings());
        assert_eq!(report.ruleset.table_count(), 1);
        assert_eq!(report.ruleset.rule_count(), 1);
    }
}
