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


//! Symbolic descriptions of the entities a caller installs: table entries, action-profile
//! members and action-profile groups, plus the key-only forms used to delete them.
//!
//! Intents deserialize from JSON so batches can be kept in files, e.g.:
//!
//! ```json
//! [{"op": "insert", "entity": "table_entry", "table": "t1",
//!   "matches": [{"kind": "exact", "field": "f1", "value": "5"}],
//!   "action": {"kind": "direct", "name": "a1", "params": [{"name": "p1", "value": "9"}]}}]
//! ```

use proto::p4runtime::update;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchIntent {
    Exact { field: String, value: String },
    Lpm { field: String, value: String, prefix_len: i32 },
    Ternary { field: String, value: String, mask: String },
    Range { field: String, low: u64, high: u64 },
    Valid { field: String, value: bool },
}

impl MatchIntent {
    pub fn field(&self) -> &str {
        use MatchIntent::*;
        match self {
            Exact { field, .. }
            | Lpm { field, .. }
            | Ternary { field, .. }
            | Range { field, .. }
            | Valid { field, .. } => field,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ParamValue {
    pub name: String,
    pub value: String,
}

impl ParamValue {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        ParamValue { name: name.into(), value: value.into() }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionIntent {
    Direct {
        name: String,
        #[serde(default)]
        params: Vec<ParamValue>,
    },
    Member { member_id: u32 },
    Group { group_id: u32 },
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TableEntryIntent {
    pub table: String,
    #[serde(default)]
    pub matches: Vec<MatchIntent>,
    #[serde(default)]
    pub action: Option<ActionIntent>,
    #[serde(default)]
    pub priority: i32,
}

/// Identifies a table entry without its action.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct EntryKey {
    pub table: String,
    #[serde(default)]
    pub matches: Vec<MatchIntent>,
    #[serde(default)]
    pub priority: i32,
}

impl From<&TableEntryIntent> for EntryKey {
    fn from(entry: &TableEntryIntent) -> Self {
        EntryKey {
            table: entry.table.clone(),
            matches: entry.matches.clone(),
            priority: entry.priority,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionProfileMemberIntent {
    pub profile: String,
    pub member_id: u32,
    pub action: String,
    #[serde(default)]
    pub params: Vec<ParamValue>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MemberKey {
    pub profile: String,
    pub member_id: u32,
}

impl From<&ActionProfileMemberIntent> for MemberKey {
    fn from(member: &ActionProfileMemberIntent) -> Self {
        MemberKey { profile: member.profile.clone(), member_id: member.member_id }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionProfileGroupIntent {
    pub profile: String,
    pub group_id: u32,
    #[serde(default)]
    pub members: Vec<u32>,
    #[serde(default)]
    pub max_size: i32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct GroupKey {
    pub profile: String,
    pub group_id: u32,
}

impl From<&ActionProfileGroupIntent> for GroupKey {
    fn from(group: &ActionProfileGroupIntent) -> Self {
        GroupKey { profile: group.profile.clone(), group_id: group.group_id }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Insert,
    Modify,
    Delete,
}

impl From<UpdateKind> for update::Type {
    fn from(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::Insert => update::Type::Insert,
            UpdateKind::Modify => update::Type::Modify,
            UpdateKind::Delete => update::Type::Delete,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntityIntent {
    TableEntry(TableEntryIntent),
    Member(ActionProfileMemberIntent),
    Group(ActionProfileGroupIntent),
}

/// One element of a write batch.  Deletes only use the key part of the entity.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpdateIntent {
    pub op: UpdateKind,
    #[serde(flatten)]
    pub entity: EntityIntent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_from_json() {
        let batch: Vec<UpdateIntent> = serde_json::from_str(
            r#"[
                {"op": "insert", "entity": "table_entry", "table": "t1",
                 "matches": [{"kind": "exact", "field": "f1", "value": "5"},
                             {"kind": "lpm", "field": "dst", "value": "10.0.0.0", "prefix_len": 8}],
                 "action": {"kind": "direct", "name": "a1", "params": [{"name": "p1", "value": "9"}]}},
                {"op": "delete", "entity": "member", "profile": "ap1", "member_id": 3, "action": "fwd"},
                {"op": "modify", "entity": "group", "profile": "ap1", "group_id": 1, "members": [3, 4]}
            ]"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].op, UpdateKind::Insert);
        match &batch[0].entity {
            EntityIntent::TableEntry(entry) => {
                assert_eq!(entry.matches[1].field(), "dst");
                assert_eq!(
                    entry.action,
                    Some(ActionIntent::Direct {
                        name: "a1".into(),
                        params: vec![ParamValue::new("p1", "9")]
                    })
                );
                assert_eq!(entry.priority, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&batch[1].entity, EntityIntent::Member(m) if m.params.is_empty()));
        assert!(matches!(&batch[2].entity, EntityIntent::Group(g) if g.members == vec![3, 4] && g.max_size == 0));
    }

    #[test]
    fn unknown_match_kind_is_rejected() {
        let r: Result<MatchIntent, _> =
            serde_json::from_str(r#"{"kind": "optional", "field": "f1", "value": "1"}"#);
        assert!(r.is_err());
    }
}
