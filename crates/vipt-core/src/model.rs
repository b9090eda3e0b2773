// In-memory view of an iptables-save dump: tables own chains, chains own rules.
// Everything lives in one arena and refers back by id.
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TableId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChainId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleId(usize);

/// Default action recorded for user-defined and extension chains
pub const NO_POLICY: &str = "-";

const ANY: &str = "any";

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    chains: Vec<ChainId>,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chains(&self) -> &[ChainId] {
        &self.chains
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    name: String,
    default_action: String,
    /// `None` for extension targets, which live outside any table
    table: Option<TableId>,
    special: bool,
    rules: Vec<RuleId>,
}

impl Chain {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_action(&self) -> &str {
        &self.default_action
    }

    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    pub fn rules(&self) -> &[RuleId] {
        &self.rules
    }

    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// Attributes of a rule to append; absent matches are `None`
#[derive(Debug, Clone, Default)]
pub struct RuleSpec {
    pub comment: Option<String>,
    pub protocol: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub in_interface: Option<String>,
    pub out_interface: Option<String>,
    pub jump: Option<ChainId>,
    pub goto: Option<ChainId>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    chain: ChainId,
    /// 1-based position inside the owning chain
    position: usize,
    comment: Option<String>,
    protocol: Option<String>,
    source: Option<String>,
    destination: Option<String>,
    in_interface: Option<String>,
    out_interface: Option<String>,

    // Where processing continues when the packet matches. Falling off the end
    // of a jumped-to chain returns here; a goto target returns to our caller.
    jump: Option<ChainId>,
    goto: Option<ChainId>,
}

impl Rule {
    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn protocol(&self) -> &str {
        self.protocol.as_deref().unwrap_or(ANY)
    }

    pub fn source(&self) -> &str {
        self.source.as_deref().unwrap_or(ANY)
    }

    pub fn destination(&self) -> &str {
        self.destination.as_deref().unwrap_or(ANY)
    }

    pub fn in_interface(&self) -> &str {
        self.in_interface.as_deref().unwrap_or(ANY)
    }

    pub fn out_interface(&self) -> &str {
        self.out_interface.as_deref().unwrap_or(ANY)
    }

    pub fn jump_target(&self) -> Option<ChainId> {
        self.jump
    }

    pub fn goto_target(&self) -> Option<ChainId> {
        self.goto
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainSummary {
    pub name: String,
    pub default_action: String,
    pub rules: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub chains: Vec<ChainSummary>,
}

impl TableSummary {
    pub fn rule_count(&self) -> usize {
        self.chains.iter().map(|c| c.rules).sum()
    }
}

/// All tables, chains and rules of one imported dump
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    tables: Vec<Table>,
    chains: Vec<Chain>,
    rules: Vec<Rule>,
    /// lowercase table name -> id, in declaration order
    table_index: IndexMap<String, TableId>,
}

impl Ruleset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, or return the existing one with the same name
    pub fn add_table(&mut self, name: &str) -> TableId {
        let key = name.to_ascii_lowercase();
        if let Some(id) = self.table_index.get(&key) {
            return *id;
        }

        let id = TableId(self.tables.len());
        self.tables.push(Table {
            name: name.to_string(),
            chains: Vec::new(),
        });
        self.table_index.insert(key, id);
        id
    }

    pub fn table_by_name(&self, name: &str) -> Option<TableId> {
        self.table_index.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn add_chain(
        &mut self,
        table: TableId,
        name: &str,
        default_action: &str,
    ) -> Result<ChainId, ModelError> {
        let table_name = self
            .tables
            .get(table.0)
            .map(|t| t.name.clone())
            .ok_or(ModelError::UnknownTable(table.0))?;

        if self.find_chain(table, name).is_some() {
            return Err(ModelError::DuplicateChain {
                table: table_name,
                chain: name.to_string(),
            });
        }

        let id = ChainId(self.chains.len());
        self.chains.push(Chain {
            name: name.to_string(),
            default_action: default_action.to_string(),
            table: Some(table),
            special: false,
            rules: Vec::new(),
        });
        self.tables[table.0].chains.push(id);
        Ok(id)
    }

    /// Create a leaf chain standing for a target extension such as SNAT
    pub fn add_special_chain(&mut self, name: &str) -> ChainId {
        let id = ChainId(self.chains.len());
        self.chains.push(Chain {
            name: name.to_string(),
            default_action: NO_POLICY.to_string(),
            table: None,
            special: true,
            rules: Vec::new(),
        });
        id
    }

    /// Case-insensitive chain lookup inside one table
    pub fn find_chain(&self, table: TableId, name: &str) -> Option<ChainId> {
        self.tables
            .get(table.0)?
            .chains
            .iter()
            .copied()
            .find(|id| self.chains[id.0].name.eq_ignore_ascii_case(name))
    }

    pub fn add_rule(&mut self, chain: ChainId, spec: RuleSpec) -> RuleId {
        let id = RuleId(self.rules.len());
        let owner = &mut self.chains[chain.0];
        owner.rules.push(id);
        self.rules.push(Rule {
            chain,
            position: owner.rules.len(),
            comment: spec.comment,
            protocol: spec.protocol,
            source: spec.source,
            destination: spec.destination,
            in_interface: spec.in_interface,
            out_interface: spec.out_interface,
            jump: spec.jump,
            goto: spec.goto,
        });
        id
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn chain(&self, id: ChainId) -> &Chain {
        &self.chains[id.0]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn tables(&self) -> impl Iterator<Item = (TableId, &Table)> {
        self.table_index
            .values()
            .map(move |id| (*id, &self.tables[id.0]))
    }

    pub fn chains_of(&self, table: TableId) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.tables[table.0]
            .chains
            .iter()
            .map(move |id| (*id, &self.chains[id.0]))
    }

    pub fn rules_of(&self, chain: ChainId) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.chains[chain.0]
            .rules
            .iter()
            .map(move |id| (*id, &self.rules[id.0]))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Display name of a chain: `table: nat, chain: PREROUTING` or `target: SNAT`
    pub fn chain_label(&self, id: ChainId) -> String {
        let chain = self.chain(id);
        match chain.table {
            Some(table) if !chain.special => {
                format!("table: {}, chain: {}", self.table(table).name, chain.name)
            }
            _ => format!("target: {}", chain.name),
        }
    }

    /// Display name of a rule, including where it sends the packet
    pub fn rule_label(&self, id: RuleId) -> String {
        let rule = self.rule(id);
        let chain = self.chain(rule.chain);
        let mut label = format!("{}, rule: {}", self.chain_label(rule.chain), rule.position);

        match rule.jump.map(|target| self.chain(target)) {
            Some(target) if target.special => {
                label.push_str(&format!("|Extension target: {}", target.name));
            }
            Some(target) => label.push_str(&format!("|Next chain: {}", target.name)),
            None => match rule.goto.map(|target| self.chain(target)) {
                Some(target) => label.push_str(&format!("|Goto chain: {}", target.name)),
                None => label.push_str(&format!("|Stay within chain: {}", chain.name)),
            },
        }

        label
    }

    pub fn summary(&self) -> Vec<TableSummary> {
        self.tables()
            .map(|(id, table)| TableSummary {
                name: table.name.clone(),
                chains: self
                    .chains_of(id)
                    .map(|(_, chain)| ChainSummary {
                        name: chain.name.clone(),
                        default_action: chain.default_action.clone(),
                        rules: chain.rules.len(),
                    })
                    .collect(),
            })
            .collect()
    }
}
