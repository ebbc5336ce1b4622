
use permission_matrix::PermissionLevel;
use permission_matrix::config::MalformedLevelPolicy;
use permission_matrix::resolution::{PermissionView, resolve_collection, resolve_database};
use permission_matrix::table::{DatabaseEntryDto, PermissionTableDto};
use permission_matrix::{PermissionTable, Principal};
use quickcheck::{Arbitrary, Gen, quickcheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Level(PermissionLevel);

impl Arbitrary for Level {
    fn arbitrary(g: &mut Gen) -> Self {
        let levels = [
            PermissionLevel::Undefined,
            PermissionLevel::None,
            PermissionLevel::ReadOnly,
            PermissionLevel::ReadWrite,
        ];
        Level(*g.choose(&levels).unwrap())
    }
}

/// One raw grant row: (database index, collection index or database row, level).
#[derive(Debug, Clone)]
struct Grant(u8, Option<u8>, Level);

impl Arbitrary for Grant {
    fn arbitrary(g: &mut Gen) -> Self {
        let database = u8::arbitrary(g) % 4;
        let collection = Option::<u8>::arbitrary(g).map(|c| c % 3);
        Grant(database, collection, Level::arbitrary(g))
    }
}

fn database_name(index: u8) -> String {
    if index == 0 { "*".to_string() } else { format!("db{index}") }
}

fn collection_name(index: u8) -> String {
    if index == 0 { "*".to_string() } else { format!("c{index}") }
}

/// Keeps the first grant per address so every ordering describes the same grants.
fn unique(grants: Vec<Grant>) -> Vec<Grant> {
    let mut seen: Vec<Grant> = Vec::new();
    for grant in grants {
        if !seen.iter().any(|g| g.0 == grant.0 && g.1 == grant.1) {
            seen.push(grant);
        }
    }
    seen
}

/// Renders a raw payload whose object keys appear in exactly the order of
/// `grants`: databases by first mention, collections in mention order.
fn payload(grants: &[Grant]) -> String {
    let mut databases: Vec<(u8, Option<&Level>, Vec<(u8, &Level)>)> = Vec::new();
    for Grant(database, collection, level) in grants {
        let index = match databases.iter().position(|(db, _, _)| db == database) {
            Some(index) => index,
            None => {
                databases.push((*database, None, Vec::new()));
                databases.len() - 1
            }
        };
        match collection {
            Some(collection) => databases[index].2.push((*collection, level)),
            None => databases[index].1 = Some(level),
        }
    }

    let entries: Vec<String> = databases
        .iter()
        .map(|(database, permission, collections)| {
            let mut fields = Vec::new();
            if let Some(Level(level)) = permission {
                fields.push(format!(r#""permission":"{level}""#));
            }
            if !collections.is_empty() {
                let rows: Vec<String> = collections
                    .iter()
                    .map(|(name, Level(level))| format!(r#""{}":"{level}""#, collection_name(*name)))
                    .collect();
                fields.push(format!(r#""collections":{{{}}}"#, rows.join(",")));
            }
            format!(r#""{}":{{{}}}"#, database_name(*database), fields.join(","))
        })
        .collect();
    format!("{{{}}}", entries.join(","))
}

/// The same grants, built directly as a DTO.
fn dto_from(grants: &[Grant]) -> PermissionTableDto {
    let mut dto = PermissionTableDto::default();
    for Grant(database, collection, Level(level)) in grants {
        let entry: &mut DatabaseEntryDto =
            dto.databases.entry(database_name(*database)).or_default();
        match collection {
            Some(collection) => {
                entry
                    .collections
                    .insert(collection_name(*collection), level.to_string());
            }
            None => entry.permission = Some(level.to_string()),
        }
    }
    dto
}

fn table_from_json(raw: &str) -> PermissionTable {
    PermissionTable::from_json(Principal::from("alice"), raw, MalformedLevelPolicy::Reject)
        .expect("generated payloads are well-formed")
}

fn table_from(dto: PermissionTableDto) -> PermissionTable {
    PermissionTable::from_dto(Principal::from("alice"), dto, MalformedLevelPolicy::Reject)
        .expect("generated levels are well-formed")
}

quickcheck! {
    fn prop_any_permutation_resolves_the_same(grants: Vec<Grant>, shift: usize) -> bool {
        let grants = unique(grants);
        let mut rotated = grants.clone();
        if !rotated.is_empty() {
            let by = shift % rotated.len();
            rotated.rotate_left(by);
        }
        let mut swapped = grants.clone();
        if swapped.len() > 1 {
            let last = swapped.len() - 1;
            swapped.swap(0, last);
        }

        let expected = PermissionView::build(&table_from_json(&payload(&grants)));
        [rotated, swapped]
            .iter()
            .all(|order| PermissionView::build(&table_from_json(&payload(order))) == expected)
    }

    fn prop_payload_key_order_does_not_matter(grants: Vec<Grant>) -> bool {
        let grants = unique(grants);
        let reversed: Vec<Grant> = grants.iter().rev().cloned().collect();

        let forward = payload(&grants);
        let backward = payload(&reversed);
        let from_forward = table_from_json(&forward);
        let from_backward = table_from_json(&backward);
        let direct = table_from(dto_from(&grants));

        from_forward == from_backward
            && from_forward == direct
            && PermissionView::build(&from_backward) == PermissionView::build(&direct)
    }

    fn prop_single_scope_propagates(level: Level, slot: u8) -> bool {
        let u = PermissionLevel::Undefined;
        let result = match slot % 3 {
            0 => resolve_collection(level.0, u, u),
            1 => resolve_collection(u, level.0, u),
            // An explicit None at the collection default counts as no grant.
            _ => {
                let resolved = resolve_collection(u, u, level.0);
                return if level.0 == PermissionLevel::None {
                    resolved == PermissionLevel::Undefined
                } else {
                    resolved == level.0
                };
            }
        };
        result == level.0
    }

    fn prop_widening_never_narrows(s: Level, d: Level, c: Level, slot: u8) -> bool {
        let before = resolve_collection(s.0, d.0, c.0);
        let widened = |level: PermissionLevel| match level {
            PermissionLevel::Undefined | PermissionLevel::None => PermissionLevel::ReadOnly,
            _ => PermissionLevel::ReadWrite,
        };
        let after = match slot % 3 {
            0 => resolve_collection(widened(s.0), d.0, c.0),
            1 => resolve_collection(s.0, widened(d.0), c.0),
            _ => resolve_collection(s.0, d.0, widened(c.0)),
        };
        after >= before
    }

    fn prop_database_ignores_collection_default(s: Level, d: Level) -> bool {
        resolve_database(s.0, d.0) == resolve_collection(s.0, d.0, PermissionLevel::Undefined)
    }

    fn prop_inherited_flag_tracks_stored_value(grants: Vec<Grant>) -> bool {
        let table = table_from_json(&payload(&unique(grants)));
        let view = PermissionView::build(&table);
        view.databases.iter().all(|database| {
            std::iter::once(&database.cell)
                .chain(&database.collections)
                .chain(std::iter::once(&database.collection_default))
                .all(|cell| cell.is_inherited_default == cell.stored.is_undefined())
        })
    }
}

#[test]
fn test_all_undefined_resolves_to_undefined() {
    let u = PermissionLevel::Undefined;
    assert_eq!(resolve_collection(u, u, u), u);
    assert_eq!(resolve_database(u, u), u);
}
