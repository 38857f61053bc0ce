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


//! Translation between intents and P4Runtime entities, driven by a [`SchemaIndex`].
//!
//! Encoding never fails: unknown names resolve to id `0` and the target rejects the result.
//! Rendering never fails either: unknown ids render as `null`.

use itertools::Itertools;

use proto::p4runtime::{
    action,
    action_profile_group,
    entity,
    field_match::{self, FieldMatchType},
    table_action,
    update,
    Action,
    ActionProfileGroup,
    ActionProfileMember,
    Entity,
    FieldMatch,
    TableAction,
    TableEntry,
    Update,
};

use tracing::warn;

use crate::intent::{
    ActionIntent,
    ActionProfileGroupIntent,
    ActionProfileMemberIntent,
    EntityIntent,
    EntryKey,
    GroupKey,
    MatchIntent,
    MemberKey,
    ParamValue,
    TableEntryIntent,
    UpdateIntent,
    UpdateKind,
};
use crate::schema::SchemaIndex;
use crate::value::{
    address_to_string,
    bound_to_string,
    bytes_to_string,
    ipv4_to_bytes,
    ternary_mask,
    u32_to_bytes,
    value_to_bytes,
};

const NULL: &str = "null";

pub fn update(kind: UpdateKind, entity: entity::Entity) -> Update {
    Update {
        r#type: update::Type::from(kind) as i32,
        entity: Some(Entity { entity: Some(entity) }),
    }
}

#[derive(Clone, Copy)]
pub struct EntryCodec<'a> {
    schema: &'a SchemaIndex,
}

impl<'a> EntryCodec<'a> {
    pub fn new(schema: &'a SchemaIndex) -> Self {
        EntryCodec { schema }
    }

    pub fn schema(&self) -> &'a SchemaIndex {
        self.schema
    }

    pub fn field_match(&self, table: &str, intent: &MatchIntent) -> FieldMatch {
        let field = intent.field();
        let field_id = self.schema.match_field_id(table, field);
        let width = self.schema.match_field_width_bytes(table, field);
        let m = match intent {
            MatchIntent::Exact { value, .. } => FieldMatchType::Exact(field_match::Exact {
                value: value_to_bytes(value, width),
            }),
            MatchIntent::Lpm { value, prefix_len, .. } => {
                // The prefix length is kept even when the address is rejected.
                let bytes = ipv4_to_bytes(value);
                if bytes.is_empty() {
                    warn!("{}.{}: {:?} is not an IPv4 address", table, field, value);
                }
                FieldMatchType::Lpm(field_match::Lpm { value: bytes, prefix_len: *prefix_len })
            }
            MatchIntent::Ternary { value, mask, .. } => {
                let bytes = ipv4_to_bytes(value);
                if bytes.is_empty() {
                    warn!("{}.{}: {:?} is not an IPv4 address", table, field, value);
                }
                FieldMatchType::Ternary(field_match::Ternary { value: bytes, mask: ternary_mask(mask) })
            }
            MatchIntent::Range { low, high, .. } => FieldMatchType::Range(field_match::Range {
                low: u32_to_bytes(*low as u32),
                high: u32_to_bytes(*high as u32),
            }),
            MatchIntent::Valid { value, .. } => {
                FieldMatchType::Valid(field_match::Valid { value: *value })
            }
        };
        FieldMatch { field_id, field_match_type: Some(m) }
    }

    pub fn direct_action(&self, name: &str, params: &[ParamValue]) -> Action {
        Action {
            action_id: self.schema.action_id(name),
            params: params
                .iter()
                .map(|p| action::Param {
                    param_id: self.schema.param_id(name, &p.name),
                    value: value_to_bytes(&p.value, self.schema.param_width_bytes(name, &p.name)),
                })
                .collect(),
        }
    }

    pub fn table_action(&self, intent: &ActionIntent) -> TableAction {
        let t = match intent {
            ActionIntent::Direct { name, params } => {
                table_action::Type::Action(self.direct_action(name, params))
            }
            ActionIntent::Member { member_id } => table_action::Type::ActionProfileMemberId(*member_id),
            ActionIntent::Group { group_id } => table_action::Type::ActionProfileGroupId(*group_id),
        };
        TableAction { r#type: Some(t) }
    }

    pub fn entry_key(&self, key: &EntryKey) -> TableEntry {
        TableEntry {
            table_id: self.schema.table_id(&key.table),
            r#match: key.matches.iter().map(|m| self.field_match(&key.table, m)).collect(),
            priority: key.priority,
            ..Default::default()
        }
    }

    pub fn table_entry(&self, intent: &TableEntryIntent) -> TableEntry {
        TableEntry {
            action: intent.action.as_ref().map(|a| self.table_action(a)),
            ..self.entry_key(&intent.into())
        }
    }

    pub fn member_key(&self, key: &MemberKey) -> ActionProfileMember {
        ActionProfileMember {
            action_profile_id: self.schema.action_profile_id(&key.profile),
            member_id: key.member_id,
            action: None,
        }
    }

    pub fn member(&self, intent: &ActionProfileMemberIntent) -> ActionProfileMember {
        ActionProfileMember {
            action: Some(self.direct_action(&intent.action, &intent.params)),
            ..self.member_key(&intent.into())
        }
    }

    pub fn group_key(&self, key: &GroupKey) -> ActionProfileGroup {
        ActionProfileGroup {
            action_profile_id: self.schema.action_profile_id(&key.profile),
            group_id: key.group_id,
            ..Default::default()
        }
    }

    pub fn group(&self, intent: &ActionProfileGroupIntent) -> ActionProfileGroup {
        ActionProfileGroup {
            members: intent
                .members
                .iter()
                .map(|&member_id| action_profile_group::Member { member_id, weight: 1, watch: 0 })
                .collect(),
            max_size: intent.max_size,
            ..self.group_key(&intent.into())
        }
    }

    /// Builds one write-batch element.  Deletes carry only the entity's key.
    pub fn update(&self, intent: &UpdateIntent) -> Update {
        let delete = intent.op == UpdateKind::Delete;
        let e = match &intent.entity {
            EntityIntent::TableEntry(entry) if delete => {
                entity::Entity::TableEntry(self.entry_key(&entry.into()))
            }
            EntityIntent::TableEntry(entry) => entity::Entity::TableEntry(self.table_entry(entry)),
            EntityIntent::Member(member) if delete => {
                entity::Entity::ActionProfileMember(self.member_key(&member.into()))
            }
            EntityIntent::Member(member) => entity::Entity::ActionProfileMember(self.member(member)),
            EntityIntent::Group(group) if delete => {
                entity::Entity::ActionProfileGroup(self.group_key(&group.into()))
            }
            EntityIntent::Group(group) => entity::Entity::ActionProfileGroup(self.group(group)),
        };
        update(intent.op, e)
    }

    /// Wildcard read of every entry of `table`, or of every table if `table` is empty.
    pub fn table_wildcard(&self, table: &str) -> Entity {
        let table_id = if table.is_empty() { 0 } else { self.schema.table_id(table) };
        Entity {
            entity: Some(entity::Entity::TableEntry(TableEntry { table_id, ..Default::default() })),
        }
    }

    pub fn member_wildcard(&self, profile: &str) -> Entity {
        Entity {
            entity: Some(entity::Entity::ActionProfileMember(ActionProfileMember {
                action_profile_id: self.schema.action_profile_id(profile),
                ..Default::default()
            })),
        }
    }

    pub fn group_wildcard(&self, profile: &str) -> Entity {
        Entity {
            entity: Some(entity::Entity::ActionProfileGroup(ActionProfileGroup {
                action_profile_id: self.schema.action_profile_id(profile),
                ..Default::default()
            })),
        }
    }

    fn render_field_match(&self, table_id: u32, fm: &FieldMatch) -> Option<String> {
        let name = self.schema.match_field_name(table_id, fm.field_id).unwrap_or(NULL);
        let rendered = match fm.field_match_type.as_ref()? {
            FieldMatchType::Exact(m) => format!("{}:exact", bytes_to_string(&m.value)),
            FieldMatchType::Lpm(m) => format!("{}/{}:lpm", address_to_string(&m.value), m.prefix_len),
            FieldMatchType::Ternary(m) => format!(
                "{}/{}:ternary",
                address_to_string(&m.value),
                address_to_string(&m.mask)
            ),
            FieldMatchType::Range(m) => format!(
                "{}..{}:range",
                bound_to_string(&m.low),
                bound_to_string(&m.high)
            ),
            FieldMatchType::Valid(m) => format!("{}:valid", m.value),
            FieldMatchType::Optional(m) => format!("{}:optional", bytes_to_string(&m.value)),
        };
        Some(format!("{} = {}", name, rendered))
    }

    pub fn render_action(&self, a: &Action) -> String {
        let params = a
            .params
            .iter()
            .map(|p| {
                format!(
                    "{} = {}",
                    self.schema.param_name(a.action_id, p.param_id).unwrap_or(NULL),
                    bytes_to_string(&p.value)
                )
            })
            .join(", ");
        format!("{}({})", self.schema.action_name(a.action_id).unwrap_or(NULL), params)
    }

    /// `<table> <field> = <value>:<kind> ... <action>(<param> = <value>, ...)`, with the action
    /// replaced by `member id = N` or `group id = N` for indirect tables.
    pub fn render_table_entry(&self, entry: &TableEntry) -> String {
        let mut parts = vec![self.schema.table_name(entry.table_id).unwrap_or(NULL).to_string()];
        parts.extend(entry.r#match.iter().filter_map(|fm| self.render_field_match(entry.table_id, fm)));
        match entry.action.as_ref().and_then(|a| a.r#type.as_ref()) {
            Some(table_action::Type::Action(a)) => parts.push(self.render_action(a)),
            Some(table_action::Type::ActionProfileMemberId(id)) => parts.push(format!("member id = {}", id)),
            Some(table_action::Type::ActionProfileGroupId(id)) => parts.push(format!("group id = {}", id)),
            None => (),
        }
        parts.join(" ")
    }

    /// `<profile> - <member id> <action>(<param> = <value>, ...)`
    pub fn render_member(&self, member: &ActionProfileMember) -> String {
        let profile = self.schema.action_profile_name(member.action_profile_id).unwrap_or(NULL);
        match &member.action {
            Some(a) => format!("{} - {} {}", profile, member.member_id, self.render_action(a)),
            None => format!("{} - {}", profile, member.member_id),
        }
    }

    /// `<profile> - <group id> : <member id> <member id> ...`
    pub fn render_group(&self, group: &ActionProfileGroup) -> String {
        let profile = self.schema.action_profile_name(group.action_profile_id).unwrap_or(NULL);
        let members = group.members.iter().map(|m| m.member_id).join(" ");
        if members.is_empty() {
            format!("{} - {} :", profile, group.group_id)
        } else {
            format!("{} - {} : {}", profile, group.group_id, members)
        }
    }

    pub fn render_entity(&self, e: &Entity) -> String {
        match &e.entity {
            Some(entity::Entity::TableEntry(t)) => self.render_table_entry(t),
            Some(entity::Entity::ActionProfileMember(m)) => self.render_member(m),
            Some(entity::Entity::ActionProfileGroup(g)) => self.render_group(g),
            None => NULL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::sample_p4info;

    fn schema() -> SchemaIndex {
        SchemaIndex::new(sample_p4info())
    }

    fn scenario() -> TableEntryIntent {
        TableEntryIntent {
            table: "t1".into(),
            matches: vec![MatchIntent::Exact { field: "f1".into(), value: "5".into() }],
            action: Some(ActionIntent::Direct {
                name: "a1".into(),
                params: vec![ParamValue::new("p1", "9")],
            }),
            priority: 0,
        }
    }

    #[test]
    fn exact_entry_with_direct_action() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);
        let entry = codec.table_entry(&scenario());

        assert_eq!(entry.table_id, 1);
        assert_eq!(
            entry.r#match,
            vec![FieldMatch {
                field_id: 1,
                field_match_type: Some(FieldMatchType::Exact(field_match::Exact { value: vec![0x05] })),
            }]
        );
        assert_eq!(
            entry.action,
            Some(TableAction {
                r#type: Some(table_action::Type::Action(Action {
                    action_id: 1,
                    params: vec![action::Param { param_id: 1, value: vec![0x09] }],
                })),
            })
        );
        assert_eq!(codec.render_table_entry(&entry), "t1 f1 = 5:exact a1(p1 = 9)");
    }

    #[test]
    fn lpm_keeps_prefix_for_invalid_address() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);

        let good = codec.field_match(
            "t1",
            &MatchIntent::Lpm { field: "dst".into(), value: "10.1.0.0".into(), prefix_len: 16 },
        );
        assert_eq!(good.field_id, 2);
        assert_eq!(
            good.field_match_type,
            Some(FieldMatchType::Lpm(field_match::Lpm { value: vec![10, 1, 0, 0], prefix_len: 16 }))
        );

        let bad = codec.field_match(
            "t1",
            &MatchIntent::Lpm { field: "dst".into(), value: "10.1.0".into(), prefix_len: 16 },
        );
        assert_eq!(
            bad.field_match_type,
            Some(FieldMatchType::Lpm(field_match::Lpm { value: vec![], prefix_len: 16 }))
        );
        let entry = TableEntry { table_id: 1, r#match: vec![bad], ..Default::default() };
        assert_eq!(codec.render_table_entry(&entry), "t1 dst = /16:lpm");
    }

    #[test]
    fn ternary_masks() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);
        let ternary = |value: &str, mask: &str| {
            codec.field_match(
                "t1",
                &MatchIntent::Ternary { field: "src".into(), value: value.into(), mask: mask.into() },
            )
        };

        for n in 1..=32u32 {
            match ternary("10.0.0.0", &n.to_string()).field_match_type {
                Some(FieldMatchType::Ternary(t)) => {
                    let bits = u32::from_be_bytes([t.mask[0], t.mask[1], t.mask[2], t.mask[3]]);
                    assert_eq!(bits.leading_ones(), n);
                    assert_eq!(bits.count_ones(), n);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(
            ternary("10.0.0.1", "255.255.255.0").field_match_type,
            Some(FieldMatchType::Ternary(field_match::Ternary {
                value: vec![10, 0, 0, 1],
                mask: vec![255, 255, 255, 0],
            }))
        );
        assert_eq!(
            ternary("host", "40").field_match_type,
            Some(FieldMatchType::Ternary(field_match::Ternary { value: vec![], mask: vec![] }))
        );
    }

    #[test]
    fn range_and_valid() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);
        let range = codec.field_match(
            "t1",
            &MatchIntent::Range { field: "l4_port".into(), low: 80, high: 0x1_0000_0443 },
        );
        assert_eq!(range.field_id, 4);
        assert_eq!(
            range.field_match_type,
            Some(FieldMatchType::Range(field_match::Range {
                low: vec![0, 0, 0, 80],
                high: vec![0, 0, 0x04, 0x43],
            }))
        );

        let valid = codec.field_match("t1", &MatchIntent::Valid { field: "vlan_valid".into(), value: true });
        assert_eq!(valid.field_id, 5);
        assert_eq!(
            valid.field_match_type,
            Some(FieldMatchType::Valid(field_match::Valid { value: true }))
        );
    }

    #[test]
    fn renders_every_match_kind() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);
        let entry = codec.table_entry(&TableEntryIntent {
            table: "t1".into(),
            matches: vec![
                MatchIntent::Lpm { field: "dst".into(), value: "10.0.0.0".into(), prefix_len: 8 },
                MatchIntent::Ternary { field: "src".into(), value: "10.0.0.1".into(), mask: "24".into() },
                MatchIntent::Range { field: "l4_port".into(), low: 80, high: 443 },
                MatchIntent::Valid { field: "vlan_valid".into(), value: true },
            ],
            action: Some(ActionIntent::Group { group_id: 4 }),
            priority: 10,
        });
        assert_eq!(entry.priority, 10);
        assert_eq!(
            codec.render_table_entry(&entry),
            "t1 dst = 10.0.0.0/8:lpm src = 10.0.0.1/255.255.255.0:ternary \
             l4_port = 80..443:range vlan_valid = true:valid group id = 4"
        );
    }

    #[test]
    fn members_and_groups() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);

        let member = codec.member(&ActionProfileMemberIntent {
            profile: "ap1".into(),
            member_id: 3,
            action: "fwd".into(),
            params: vec![ParamValue::new("port", "2"), ParamValue::new("dmac", "00:00:00:00:00:0a")],
        });
        assert_eq!(member.action_profile_id, 7);
        let a = member.action.as_ref().unwrap();
        assert_eq!(a.action_id, 2);
        assert_eq!(a.params[0].value, vec![0, 2]);
        assert_eq!(codec.render_member(&member), "ap1 - 3 fwd(port = 2, dmac = 00:00:00:00:00:0a)");

        let group = codec.group(&ActionProfileGroupIntent {
            profile: "ap1".into(),
            group_id: 1,
            members: vec![3, 4],
            max_size: 8,
        });
        assert_eq!(group.max_size, 8);
        assert_eq!(group.members.len(), 2);
        assert_eq!(codec.render_group(&group), "ap1 - 1 : 3 4");

        let entry = codec.table_entry(&TableEntryIntent {
            table: "t2".into(),
            matches: vec![MatchIntent::Exact { field: "mac".into(), value: "00:00:00:00:00:01".into() }],
            action: Some(ActionIntent::Member { member_id: 3 }),
            priority: 0,
        });
        assert_eq!(codec.render_table_entry(&entry), "t2 mac = 00:00:00:00:00:01:exact member id = 3");
    }

    #[test]
    fn deletes_carry_only_keys() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);
        let u = codec.update(&UpdateIntent {
            op: UpdateKind::Delete,
            entity: EntityIntent::TableEntry(scenario()),
        });
        assert_eq!(u.r#type, update::Type::Delete as i32);
        match u.entity.and_then(|e| e.entity) {
            Some(entity::Entity::TableEntry(t)) => {
                assert_eq!(t.table_id, 1);
                assert_eq!(t.r#match.len(), 1);
                assert_eq!(t.action, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        let u = codec.update(&UpdateIntent {
            op: UpdateKind::Insert,
            entity: EntityIntent::Group(ActionProfileGroupIntent {
                profile: "ap1".into(),
                group_id: 2,
                members: vec![1],
                max_size: 0,
            }),
        });
        assert_eq!(u.r#type, update::Type::Insert as i32);
    }

    #[test]
    fn unknown_names_encode_as_zero_and_render_as_null() {
        let schema = schema();
        let codec = EntryCodec::new(&schema);
        let entry = codec.table_entry(&TableEntryIntent {
            table: "missing".into(),
            matches: vec![MatchIntent::Exact { field: "f9".into(), value: "1".into() }],
            action: Some(ActionIntent::Direct {
                name: "nope".into(),
                params: vec![ParamValue::new("x", "1")],
            }),
            priority: 0,
        });
        assert_eq!(entry.table_id, 0);
        assert_eq!(entry.r#match[0].field_id, 0);
        assert_eq!(codec.render_table_entry(&entry), "null null = :exact null(null = )");
        assert_eq!(codec.render_entity(&Entity { entity: None }), "null");
        assert_eq!(
            codec.render_group(&ActionProfileGroup { action_profile_id: 99, group_id: 5, ..Default::default() }),
            "null - 5 :"
        );
    }
}
