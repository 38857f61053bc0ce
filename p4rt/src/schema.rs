/*
Copyright (c) 2021 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/


//! Typed view of a P4Info document with O(1) name and id lookups.
//!
//! Lookup misses are not errors: ids resolve to `0` and names to `None`, and callers pass those
//! sentinels on to the wire.

use itertools::Itertools;

use prost::Message;

use proto::p4info;

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::fs;
use std::path::Path;

use crate::error::{P4Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotations(Vec<String>);

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[String]> for Annotations {
    fn from(annotations: &[String]) -> Self {
        Annotations(
            annotations
                .iter()
                .map(|s| s.trim_start_matches('@').to_string())
                .collect(),
        )
    }
}

impl Display for Annotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Sorted for predictable output.
        for (i, a) in self.0.iter().sorted().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "@{}", a)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preamble {
    pub id: u32,
    pub name: String,
    pub alias: String,
    pub annotations: Annotations,
}

impl From<&p4info::Preamble> for Preamble {
    fn from(p: &p4info::Preamble) -> Self {
        Preamble {
            id: p.id,
            name: p.name.clone(),
            alias: p.alias.clone(),
            annotations: p.annotations.as_slice().into(),
        }
    }
}

fn preamble_of(p: Option<&p4info::Preamble>) -> Preamble {
    p.map(Preamble::from).unwrap_or_default()
}

fn width_bytes(bit_width: i32) -> usize {
    if bit_width <= 0 {
        0
    } else {
        ((i64::from(bit_width) + 7) / 8) as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchType {
    Unspecified,
    Valid,
    Exact,
    Lpm,
    Ternary,
    Range,
    Optional,
    Other(String),
}

impl Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use MatchType::*;
        let s = match self {
            Unspecified => "unspecified",
            Valid => "valid",
            Exact => "exact",
            Lpm => "LPM",
            Ternary => "ternary",
            Range => "range",
            Optional => "optional",
            Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchField {
    // P4Info carries no alias for match fields; the name doubles as one.
    pub preamble: Preamble,
    pub bit_width: i32,
    pub match_type: MatchType,
}

impl From<&p4info::MatchField> for MatchField {
    fn from(mf: &p4info::MatchField) -> Self {
        use p4info::match_field::MatchType as Wire;
        MatchField {
            preamble: Preamble {
                id: mf.id,
                name: mf.name.clone(),
                alias: mf.name.clone(),
                annotations: mf.annotations.as_slice().into(),
            },
            bit_width: mf.bitwidth,
            match_type: match mf.match_type() {
                Wire::Valid => MatchType::Valid,
                Wire::Exact => MatchType::Exact,
                Wire::Lpm => MatchType::Lpm,
                Wire::Ternary => MatchType::Ternary,
                Wire::Range => MatchType::Range,
                Wire::Optional => MatchType::Optional,
                Wire::Unspecified => {
                    if mf.other_match_type.is_empty() {
                        MatchType::Unspecified
                    } else {
                        MatchType::Other(mf.other_match_type.clone())
                    }
                }
            },
        }
    }
}

impl MatchField {
    pub fn width_bytes(&self) -> usize {
        width_bytes(self.bit_width)
    }
}

impl Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field {}: bit<{}> {}-match", self.preamble.name, self.bit_width, self.match_type)?;
        if !self.preamble.annotations.is_empty() {
            write!(f, " {}", self.preamble.annotations)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Param {
    pub preamble: Preamble,
    pub bit_width: i32,
}

impl From<&p4info::action::Param> for Param {
    fn from(ap: &p4info::action::Param) -> Self {
        Param {
            preamble: Preamble {
                id: ap.id,
                name: ap.name.clone(),
                alias: ap.name.clone(),
                annotations: ap.annotations.as_slice().into(),
            },
            bit_width: ap.bitwidth,
        }
    }
}

impl Param {
    pub fn width_bytes(&self) -> usize {
        width_bytes(self.bit_width)
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: bit<{}>", self.preamble.name, self.bit_width)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Action {
    pub preamble: Preamble,
    pub params: Vec<Param>,
    param_by_name: HashMap<String, usize>,
    param_by_id: HashMap<u32, usize>,
}

impl From<&p4info::Action> for Action {
    fn from(a: &p4info::Action) -> Self {
        let params: Vec<Param> = a.params.iter().map(|x| x.into()).collect();
        Action {
            preamble: preamble_of(a.preamble.as_ref()),
            param_by_name: params
                .iter()
                .enumerate()
                .map(|(i, p)| (p.preamble.name.clone(), i))
                .collect(),
            param_by_id: params.iter().enumerate().map(|(i, p)| (p.preamble.id, i)).collect(),
            params,
        }
    }
}

impl Action {
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.param_by_name.get(name).map(|&i| &self.params[i])
    }

    pub fn param_by_id(&self, id: u32) -> Option<&Param> {
        self.param_by_id.get(&id).map(|&i| &self.params[i])
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action {}(", self.preamble.name)?;
        for (p_index, p) in self.params.iter().enumerate() {
            if p_index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionRef {
    pub id: u32,
    /// Empty if the P4Info references an action it does not define.
    pub name: String,
    pub may_be_default: bool, // Allowed as the default action?
    pub may_be_entry: bool,   // Allowed as an entry's action?
    pub annotations: Annotations,
}

impl ActionRef {
    fn new_from_proto(ar: &p4info::ActionRef, actions: &HashMap<u32, String>) -> Self {
        use p4info::action_ref::Scope;
        ActionRef {
            id: ar.id,
            name: actions.get(&ar.id).cloned().unwrap_or_default(),
            may_be_default: ar.scope() != Scope::TableOnly,
            may_be_entry: ar.scope() != Scope::DefaultOnly,
            annotations: ar.annotations.as_slice().into(),
        }
    }
}

impl Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.may_be_entry {
            write!(f, "default-only ")?;
        } else if !self.may_be_default {
            write!(f, "not-default ")?;
        }
        write!(f, "{}", self.name)?;
        if !self.annotations.is_empty() {
            write!(f, " {}", self.annotations)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    pub preamble: Preamble,
    pub match_fields: Vec<MatchField>,
    pub actions: Vec<ActionRef>,
    /// Action profile implementing the table, `0` for direct tables.
    pub implementation_id: u32,
    max_entries: Option<u64>,
    idle_notify: bool,
    is_const_table: bool,
    field_by_name: HashMap<String, usize>,
    field_by_id: HashMap<u32, usize>,
}

impl Table {
    fn new_from_proto(t: &p4info::Table, actions: &HashMap<u32, String>) -> Self {
        let match_fields: Vec<MatchField> = t.match_fields.iter().map(|x| x.into()).collect();
        Table {
            preamble: preamble_of(t.preamble.as_ref()),
            actions: t
                .action_refs
                .iter()
                .map(|x| ActionRef::new_from_proto(x, actions))
                .collect(),
            implementation_id: t.implementation_id,
            max_entries: if t.size > 0 { Some(t.size as u64) } else { None },
            idle_notify: t.idle_timeout_behavior() == p4info::table::IdleTimeoutBehavior::NotifyControl,
            is_const_table: t.is_const_table,
            field_by_name: match_fields
                .iter()
                .enumerate()
                .map(|(i, mf)| (mf.preamble.name.clone(), i))
                .collect(),
            field_by_id: match_fields
                .iter()
                .enumerate()
                .map(|(i, mf)| (mf.preamble.id, i))
                .collect(),
            match_fields,
        }
    }

    pub fn match_field(&self, name: &str) -> Option<&MatchField> {
        self.field_by_name.get(name).map(|&i| &self.match_fields[i])
    }

    pub fn match_field_by_id(&self, id: u32) -> Option<&MatchField> {
        self.field_by_id.get(&id).map(|&i| &self.match_fields[i])
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {}:", self.preamble.name)?;
        for mf in &self.match_fields {
            write!(f, "\t{}", mf)?;
        }
        for ar in &self.actions {
            write!(f, "\t{}", ar)?;
        }
        if let Some(max_entries) = self.max_entries {
            write!(f, "\tsize: {}", max_entries)?;
        }
        if self.is_const_table {
            write!(f, "\tconst table")?;
        }
        if self.idle_notify {
            write!(f, "\tidle notify")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionProfile {
    pub preamble: Preamble,
    pub table_ids: Vec<u32>,
    pub with_selector: bool,
    pub size: i64,
    pub max_group_size: i32,
}

impl From<&p4info::ActionProfile> for ActionProfile {
    fn from(ap: &p4info::ActionProfile) -> Self {
        ActionProfile {
            preamble: preamble_of(ap.preamble.as_ref()),
            table_ids: ap.table_ids.clone(),
            with_selector: ap.with_selector,
            size: ap.size,
            max_group_size: ap.max_group_size,
        }
    }
}

/// A loaded P4Info plus hash indexes over its tables, actions and action profiles.
///
/// Built once per pipeline and shared as `Arc<SchemaIndex>`; a new pipeline replaces the whole
/// index.
#[derive(Clone, Debug)]
pub struct SchemaIndex {
    p4info: p4info::P4Info,
    tables: Vec<Table>,
    actions: Vec<Action>,
    action_profiles: Vec<ActionProfile>,
    table_by_name: HashMap<String, usize>,
    table_by_id: HashMap<u32, usize>,
    action_by_name: HashMap<String, usize>,
    action_by_id: HashMap<u32, usize>,
    profile_by_name: HashMap<String, usize>,
    profile_by_id: HashMap<u32, usize>,
}

impl From<p4info::P4Info> for SchemaIndex {
    fn from(p4info: p4info::P4Info) -> Self {
        SchemaIndex::new(p4info)
    }
}

impl SchemaIndex {
    pub fn new(p4info: p4info::P4Info) -> Self {
        let actions: Vec<Action> = p4info.actions.iter().map(|x| x.into()).collect();
        let action_names: HashMap<u32, String> = actions
            .iter()
            .map(|a| (a.preamble.id, a.preamble.name.clone()))
            .collect();
        let tables: Vec<Table> = p4info
            .tables
            .iter()
            .map(|x| Table::new_from_proto(x, &action_names))
            .collect();
        let action_profiles: Vec<ActionProfile> =
            p4info.action_profiles.iter().map(|x| x.into()).collect();

        SchemaIndex {
            table_by_name: index_by(&tables, |t| t.preamble.name.clone()),
            table_by_id: index_by(&tables, |t| t.preamble.id),
            action_by_name: index_by(&actions, |a| a.preamble.name.clone()),
            action_by_id: index_by(&actions, |a| a.preamble.id),
            profile_by_name: index_by(&action_profiles, |p| p.preamble.name.clone()),
            profile_by_id: index_by(&action_profiles, |p| p.preamble.id),
            p4info,
            tables,
            actions,
            action_profiles,
        }
    }

    /// Parses a binary-encoded P4Info.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let p4info = p4info::P4Info::decode(bytes).map_err(|e| P4Error::SchemaLoad(e.to_string()))?;
        Ok(SchemaIndex::new(p4info))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|e| P4Error::SchemaLoad(format!("{}: could not read P4Info ({})", path.display(), e)))?;
        let p4info = p4info::P4Info::decode(bytes.as_slice())
            .map_err(|e| P4Error::SchemaLoad(format!("{}: {}", path.display(), e)))?;
        Ok(SchemaIndex::new(p4info))
    }

    pub fn p4info(&self) -> &p4info::P4Info {
        &self.p4info
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action_profiles(&self) -> &[ActionProfile] {
        &self.action_profiles
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.table_by_name.get(name).map(|&i| &self.tables[i])
    }

    pub fn table_by_id(&self, id: u32) -> Option<&Table> {
        self.table_by_id.get(&id).map(|&i| &self.tables[i])
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.action_by_name.get(name).map(|&i| &self.actions[i])
    }

    pub fn action_by_id(&self, id: u32) -> Option<&Action> {
        self.action_by_id.get(&id).map(|&i| &self.actions[i])
    }

    pub fn action_profile(&self, name: &str) -> Option<&ActionProfile> {
        self.profile_by_name.get(name).map(|&i| &self.action_profiles[i])
    }

    pub fn action_profile_by_id(&self, id: u32) -> Option<&ActionProfile> {
        self.profile_by_id.get(&id).map(|&i| &self.action_profiles[i])
    }

    pub fn table_id(&self, name: &str) -> u32 {
        self.table(name).map_or(0, |t| t.preamble.id)
    }

    pub fn table_name(&self, id: u32) -> Option<&str> {
        self.table_by_id(id).map(|t| t.preamble.name.as_str())
    }

    pub fn match_field_id(&self, table: &str, field: &str) -> u32 {
        self.table(table)
            .and_then(|t| t.match_field(field))
            .map_or(0, |mf| mf.preamble.id)
    }

    pub fn match_field_name(&self, table_id: u32, field_id: u32) -> Option<&str> {
        self.table_by_id(table_id)
            .and_then(|t| t.match_field_by_id(field_id))
            .map(|mf| mf.preamble.name.as_str())
    }

    pub fn match_field_width_bytes(&self, table: &str, field: &str) -> usize {
        self.table(table)
            .and_then(|t| t.match_field(field))
            .map_or(0, |mf| mf.width_bytes())
    }

    pub fn action_id(&self, name: &str) -> u32 {
        self.action(name).map_or(0, |a| a.preamble.id)
    }

    pub fn action_name(&self, id: u32) -> Option<&str> {
        self.action_by_id(id).map(|a| a.preamble.name.as_str())
    }

    pub fn param_id(&self, action: &str, param: &str) -> u32 {
        self.action(action)
            .and_then(|a| a.param(param))
            .map_or(0, |p| p.preamble.id)
    }

    pub fn param_name(&self, action_id: u32, param_id: u32) -> Option<&str> {
        self.action_by_id(action_id)
            .and_then(|a| a.param_by_id(param_id))
            .map(|p| p.preamble.name.as_str())
    }

    pub fn param_width_bytes(&self, action: &str, param: &str) -> usize {
        self.action(action)
            .and_then(|a| a.param(param))
            .map_or(0, |p| p.width_bytes())
    }

    pub fn action_profile_id(&self, name: &str) -> u32 {
        self.action_profile(name).map_or(0, |p| p.preamble.id)
    }

    pub fn action_profile_name(&self, id: u32) -> Option<&str> {
        self.action_profile_by_id(id).map(|p| p.preamble.name.as_str())
    }
}

fn index_by<T, K, F>(items: &[T], key: F) -> HashMap<K, usize>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    items.iter().enumerate().map(|(i, x)| (key(x), i)).collect()
}

/// One line per table, then one per action and one per action profile.
impl Display for SchemaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in &self.tables {
            writeln!(f, "{}", table)?;
        }
        for action in &self.actions {
            writeln!(f, "{}", action)?;
        }
        for profile in &self.action_profiles {
            let tables = profile
                .table_ids
                .iter()
                .map(|&id| self.table_name(id).unwrap_or("null"))
                .join(" ");
            write!(f, "action profile {}: tables {}", profile.preamble.name, tables)?;
            if profile.with_selector {
                write!(f, "\twith selector")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proto::p4info::{match_field, P4Info};

    fn preamble(id: u32, name: &str) -> Option<p4info::Preamble> {
        Some(p4info::Preamble { id, name: name.into(), ..Default::default() })
    }

    fn field(id: u32, name: &str, bitwidth: i32, match_type: match_field::MatchType) -> p4info::MatchField {
        p4info::MatchField {
            id,
            name: name.into(),
            bitwidth,
            match_type: match_type as i32,
            ..Default::default()
        }
    }

    fn param(id: u32, name: &str, bitwidth: i32) -> p4info::action::Param {
        p4info::action::Param { id, name: name.into(), bitwidth, ..Default::default() }
    }

    /// `t1` with one field of every match kind, `a1(p1)` and `fwd(port, dmac)`, and a selector
    /// profile `ap1` implementing `t2`.
    pub(crate) fn sample_p4info() -> P4Info {
        use match_field::MatchType::*;
        P4Info {
            tables: vec![
                p4info::Table {
                    preamble: preamble(1, "t1"),
                    match_fields: vec![
                        field(1, "f1", 8, Exact),
                        field(2, "dst", 32, Lpm),
                        field(3, "src", 32, Ternary),
                        field(4, "l4_port", 16, Range),
                        field(5, "vlan_valid", 1, Valid),
                    ],
                    action_refs: vec![
                        p4info::ActionRef { id: 1, ..Default::default() },
                        p4info::ActionRef { id: 2, ..Default::default() },
                    ],
                    size: 1024,
                    ..Default::default()
                },
                p4info::Table {
                    preamble: preamble(2, "t2"),
                    match_fields: vec![field(1, "mac", 48, Exact)],
                    action_refs: vec![p4info::ActionRef { id: 2, ..Default::default() }],
                    implementation_id: 7,
                    ..Default::default()
                },
            ],
            actions: vec![
                p4info::Action { preamble: preamble(1, "a1"), params: vec![param(1, "p1", 8)] },
                p4info::Action {
                    preamble: preamble(2, "fwd"),
                    params: vec![param(1, "port", 9), param(2, "dmac", 48)],
                },
            ],
            action_profiles: vec![p4info::ActionProfile {
                preamble: preamble(7, "ap1"),
                table_ids: vec![2],
                with_selector: true,
                size: 128,
                max_group_size: 8,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn ids_and_names_resolve_both_ways() {
        let schema = SchemaIndex::new(sample_p4info());
        assert_eq!(schema.table_id("t1"), 1);
        assert_eq!(schema.table_name(2), Some("t2"));
        assert_eq!(schema.action_id("fwd"), 2);
        assert_eq!(schema.action_name(1), Some("a1"));
        assert_eq!(schema.param_id("fwd", "dmac"), 2);
        assert_eq!(schema.param_name(2, 1), Some("port"));
        assert_eq!(schema.action_profile_id("ap1"), 7);
        assert_eq!(schema.action_profile_name(7), Some("ap1"));
    }

    #[test]
    fn match_fields_round_trip() {
        let schema = SchemaIndex::new(sample_p4info());
        for table in schema.tables() {
            for mf in &table.match_fields {
                let name = &table.preamble.name;
                let id = schema.match_field_id(name, &mf.preamble.name);
                assert_ne!(id, 0);
                assert_eq!(
                    schema.match_field_name(table.preamble.id, id),
                    Some(mf.preamble.name.as_str())
                );
            }
        }
    }

    #[test]
    fn widths_round_up_to_bytes() {
        let schema = SchemaIndex::new(sample_p4info());
        assert_eq!(schema.match_field_width_bytes("t1", "f1"), 1);
        assert_eq!(schema.match_field_width_bytes("t1", "vlan_valid"), 1);
        assert_eq!(schema.match_field_width_bytes("t2", "mac"), 6);
        assert_eq!(schema.param_width_bytes("fwd", "port"), 2);
        assert_eq!(schema.param_width_bytes("fwd", "dmac"), 6);

        assert_eq!(width_bytes(0), 0);
        assert_eq!(width_bytes(-8), 0);
        assert_eq!(width_bytes(i32::MAX), 268_435_456);
    }

    #[test]
    fn misses_are_sentinels() {
        let schema = SchemaIndex::new(sample_p4info());
        assert_eq!(schema.table_id("nope"), 0);
        assert_eq!(schema.table_name(99), None);
        assert_eq!(schema.match_field_id("t1", "nope"), 0);
        assert_eq!(schema.match_field_id("nope", "f1"), 0);
        assert_eq!(schema.match_field_name(1, 99), None);
        assert_eq!(schema.match_field_width_bytes("t1", "nope"), 0);
        assert_eq!(schema.param_id("a1", "nope"), 0);
        assert_eq!(schema.param_name(99, 1), None);
        assert_eq!(schema.param_width_bytes("nope", "p1"), 0);
        assert_eq!(schema.action_profile_id("nope"), 0);
    }

    #[test]
    fn decodes_binary_p4info() {
        let bytes = sample_p4info().encode_to_vec();
        let schema = SchemaIndex::from_bytes(&bytes).unwrap();
        assert_eq!(schema.tables().len(), 2);
        assert_eq!(schema.p4info(), &sample_p4info());

        assert!(matches!(
            SchemaIndex::from_bytes(&[0xff, 0xff, 0xff]),
            Err(P4Error::SchemaLoad(_))
        ));
        assert!(matches!(
            SchemaIndex::from_file("/nonexistent/p4info.bin"),
            Err(P4Error::SchemaLoad(_))
        ));
    }

    #[test]
    fn listing() {
        let schema = SchemaIndex::new(sample_p4info());
        let listing = schema.to_string();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "table t1:\tfield f1: bit<8> exact-match\tfield dst: bit<32> LPM-match\t\
             field src: bit<32> ternary-match\tfield l4_port: bit<16> range-match\t\
             field vlan_valid: bit<1> valid-match\ta1\tfwd\tsize: 1024"
        );
        assert_eq!(lines[2], "action a1(p1: bit<8>)");
        assert_eq!(lines[3], "action fwd(port: bit<9>, dmac: bit<48>)");
        assert_eq!(lines[4], "action profile ap1: tables t2\twith selector");
    }
}
