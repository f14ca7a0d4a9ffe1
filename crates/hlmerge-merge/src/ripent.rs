// ripent.rs — entity rewrites that make a merged series behave at runtime
//
// Everything here is a best-effort content rewrite: a failed or skipped
// rewrite leaves an entity inert, never a corrupt lump.

use hlmerge_bsp::{Entity, Map};
use hlmerge_common::Bounds;
use tracing::{info, warn};

/// Point entities whose spawning is managed per map in a series.
pub const MANAGED_CLASS_PREFIXES: [&str; 4] = ["monster_", "weapon_", "item_", "ammo_"];

/// Keys whose values reference another entity's targetname.
const REF_KEYS: [&str; 4] = ["target", "killtarget", "master", "changetarget"];

fn is_managed_class(classname: &str) -> bool {
    MANAGED_CLASS_PREFIXES
        .iter()
        .any(|p| classname.starts_with(p))
}

// ============================================================
// Name uniqueness
// ============================================================

/// Rename targetnames that collide across source maps. The map that used
/// a name first keeps it; later maps get a `<mapname>_` prefix, and
/// references within the same map follow the rename. Returns the number
/// of renamed entities.
pub fn force_unique_ent_names_per_map(ents: &mut [Entity]) -> usize {
    // name -> source maps using it, in first-appearance order
    let mut users: Vec<(String, Vec<String>)> = Vec::new();
    for ent in ents.iter() {
        let Some(name) = ent.targetname() else { continue };
        if ent.source_map.is_empty() {
            continue;
        }
        let idx = match users.iter().position(|(n, _)| n == name) {
            Some(i) => i,
            None => {
                users.push((name.to_string(), Vec::new()));
                users.len() - 1
            }
        };
        if !users[idx].1.contains(&ent.source_map) {
            users[idx].1.push(ent.source_map.clone());
        }
    }

    let mut renamed = 0usize;
    for (name, maps) in users.iter().filter(|(_, m)| m.len() > 1) {
        // every map after the first loses the plain name
        for src in &maps[1..] {
            let new_name = format!("{src}_{name}");
            for ent in ents.iter_mut().filter(|e| &e.source_map == src) {
                if ent.targetname() == Some(name.as_str()) {
                    ent.set("targetname", &new_name);
                    renamed += 1;
                }
                rewrite_references(ent, name, &new_name);
            }
            info!(old = %name, new = %new_name, map = %src, "renamed colliding targetname");
        }
    }
    renamed
}

fn rewrite_references(ent: &mut Entity, old: &str, new: &str) {
    let is_multi_manager = ent.classname() == "multi_manager";
    for (k, v) in ent.keyvalues.iter_mut() {
        if REF_KEYS.contains(&k.as_str()) && v == old {
            *v = new.to_string();
        }
        // multi_manager keys are themselves targetnames
        if is_multi_manager && k == old {
            *k = new.to_string();
        }
    }
}

// ============================================================
// Series logic
// ============================================================

/// Rewrite the merged entity list for multi-map series semantics:
/// level transitions become teleports, later maps' spawn points become
/// teleport destinations, and (unless `noscript`) entering a map fires a
/// relay that cleans up the previous map's managed entities. Returns the
/// number of rewritten level-transition entities.
pub fn update_map_series_entity_logic(
    map: &mut Map,
    series: &[(String, Bounds)],
    noscript: bool,
) -> usize {
    let names: Vec<&str> = series.iter().map(|(n, _)| n.as_str()).collect();

    // later maps' spawn points turn into teleport destinations
    for ent in &mut map.entities {
        if ent.classname() != "info_player_start" {
            continue;
        }
        let Some(k) = names.iter().position(|n| *n == ent.source_map) else {
            continue;
        };
        if k == 0 {
            continue;
        }
        ent.set("classname", "info_teleport_destination");
        ent.set("targetname", &format!("{}_start", ent.source_map));
    }

    // level transitions become teleports into the next map's spawn
    let mut rewritten = 0usize;
    let mut companions: Vec<Entity> = Vec::new();
    for ent in &mut map.entities {
        if ent.classname() != "trigger_changelevel" {
            continue;
        }
        let Some(dest) = ent.get("map").map(str::to_string) else {
            continue;
        };
        let Some(k) = names.iter().position(|n| *n == dest) else {
            warn!(map = %dest, "changelevel points outside the series, left untouched");
            continue;
        };
        if dest == ent.source_map {
            continue;
        }
        ent.set("classname", "trigger_teleport");
        ent.set("target", &format!("{dest}_start"));
        ent.remove("map");
        ent.remove("landmark");
        rewritten += 1;

        // a second trigger on the same brush fires the entry relay
        if !noscript && k > 0 {
            if let Some(model) = ent.get("model").map(str::to_string) {
                let mut once = Entity::new("trigger_once");
                once.set("model", &model);
                once.set("target", &format!("{dest}_entry"));
                once.source_map = ent.source_map.clone();
                companions.push(once);
            }
        }
    }
    map.entities.extend(companions);

    if !noscript {
        // unnamed managed entities of each later map get a shared tag...
        for ent in &mut map.entities {
            if ent.targetname().is_some() || !is_managed_class(ent.classname()) {
                continue;
            }
            let Some(k) = names.iter().position(|n| *n == ent.source_map) else {
                continue;
            };
            if k > 0 {
                ent.set("targetname", &format!("{}_ents", ent.source_map));
            }
        }
        // ...so entering map k can clean up map k-1
        for k in 1..series.len() {
            let mut relay = Entity::new("trigger_relay");
            relay.set("targetname", &format!("{}_entry", series[k].0));
            relay.set("killtarget", &format!("{}_ents", series[k - 1].0));
            relay.source_map = series[k].0.clone();
            map.entities.push(relay);
        }
    }

    map.entities.push(series_info_entity(series));
    info!(
        transitions = rewritten,
        maps = series.len(),
        "updated series entity logic"
    );
    rewritten
}

/// Inert marker entity recording the series layout for tools and
/// scripts that inspect the merged map.
fn series_info_entity(series: &[(String, Bounds)]) -> Entity {
    let mut info = Entity::new("info_target");
    info.set("targetname", "merge_info");
    info.set("merge_count", &series.len().to_string());
    for (k, (name, bounds)) in series.iter().enumerate() {
        info.set(&format!("map_{k}"), name);
        info.set(
            &format!("map_{k}_mins"),
            &format!("{} {} {}", bounds.mins[0], bounds.mins[1], bounds.mins[2]),
        );
        info.set(
            &format!("map_{k}_maxs"),
            &format!("{} {} {}", bounds.maxs[0], bounds.maxs[1], bounds.maxs[2]),
        );
    }
    info
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn named(classname: &str, targetname: &str, source: &str) -> Entity {
        let mut e = Entity::new(classname);
        if !targetname.is_empty() {
            e.set("targetname", targetname);
        }
        e.source_map = source.to_string();
        e
    }

    #[test]
    fn colliding_names_get_map_prefix() {
        let mut ents = vec![
            named("func_button", "door1", "alpha"),
            named("func_door", "door1", "alpha"),
            named("func_door", "door1", "beta"),
            named("func_door", "exit", "beta"),
        ];
        let renamed = force_unique_ent_names_per_map(&mut ents);
        assert_eq!(renamed, 1);
        assert_eq!(ents[0].targetname(), Some("door1"));
        assert_eq!(ents[1].targetname(), Some("door1"));
        assert_eq!(ents[2].targetname(), Some("beta_door1"));
        assert_eq!(ents[3].targetname(), Some("exit"));

        // no cross-map collisions remain
        for i in 0..ents.len() {
            for j in i + 1..ents.len() {
                if ents[i].source_map != ents[j].source_map {
                    assert_ne!(ents[i].targetname(), ents[j].targetname());
                }
            }
        }
    }

    #[test]
    fn references_follow_the_rename() {
        let mut trigger = named("trigger_once", "", "beta");
        trigger.set("target", "door1");
        let mut mm = named("multi_manager", "", "beta");
        mm.keyvalues.push(("door1".to_string(), "1.5".to_string()));
        let mut ents = vec![
            named("func_door", "door1", "alpha"),
            named("func_door", "door1", "beta"),
            trigger,
            mm,
        ];
        force_unique_ent_names_per_map(&mut ents);
        assert_eq!(ents[2].get("target"), Some("beta_door1"));
        assert!(ents[3].keyvalues.iter().any(|(k, _)| k == "beta_door1"));
    }

    #[test]
    fn same_map_reuse_is_not_renamed() {
        let mut ents = vec![
            named("func_door", "door1", "alpha"),
            named("func_door", "door1", "alpha"),
        ];
        assert_eq!(force_unique_ent_names_per_map(&mut ents), 0);
    }

    fn series_fixture() -> (Map, Vec<(String, Bounds)>) {
        let mut map = Map::new("merged");
        map.entities.push(named("worldspawn", "", "alpha"));
        map.entities.push(named("info_player_start", "", "alpha"));
        map.entities.push(named("info_player_start", "", "beta"));
        map.entities.push(named("monster_barney", "", "beta"));
        map.entities.push(named("monster_zombie", "", "alpha"));

        let mut change = named("trigger_changelevel", "", "alpha");
        change.set("map", "beta");
        change.set("landmark", "lm1");
        change.set("model", "*3");
        map.entities.push(change);

        let series = vec![
            ("alpha".to_string(), Bounds::new([0.0; 3], [100.0; 3])),
            (
                "beta".to_string(),
                Bounds::new([164.0, 0.0, 0.0], [264.0, 100.0, 100.0]),
            ),
        ];
        (map, series)
    }

    #[test]
    fn changelevel_becomes_teleport() {
        let (mut map, series) = series_fixture();
        let rewritten = update_map_series_entity_logic(&mut map, &series, false);
        assert_eq!(rewritten, 1);

        let tp = map
            .entities
            .iter()
            .find(|e| e.classname() == "trigger_teleport")
            .unwrap();
        assert_eq!(tp.get("target"), Some("beta_start"));
        assert_eq!(tp.get("map"), None);
        assert_eq!(tp.get("landmark"), None);

        // beta's spawn became the matching destination
        let dest = map
            .entities
            .iter()
            .find(|e| e.classname() == "info_teleport_destination")
            .unwrap();
        assert_eq!(dest.targetname(), Some("beta_start"));
        assert_eq!(dest.source_map, "beta");

        // the first map's spawn is untouched
        assert!(map
            .entities
            .iter()
            .any(|e| e.classname() == "info_player_start" && e.source_map == "alpha"));
    }

    #[test]
    fn entry_relay_cleans_up_previous_map() {
        let (mut map, series) = series_fixture();
        update_map_series_entity_logic(&mut map, &series, false);

        let relay = map
            .entities
            .iter()
            .find(|e| e.classname() == "trigger_relay")
            .unwrap();
        assert_eq!(relay.targetname(), Some("beta_entry"));
        assert_eq!(relay.get("killtarget"), Some("alpha_ents"));

        // the companion trigger shares the changelevel brush
        let once = map
            .entities
            .iter()
            .find(|e| e.classname() == "trigger_once")
            .unwrap();
        assert_eq!(once.get("model"), Some("*3"));
        assert_eq!(once.get("target"), Some("beta_entry"));

        // later-map monsters carry the cleanup tag, first-map ones do not
        let barney = map
            .entities
            .iter()
            .find(|e| e.classname() == "monster_barney")
            .unwrap();
        assert_eq!(barney.targetname(), Some("beta_ents"));
        let zombie = map
            .entities
            .iter()
            .find(|e| e.classname() == "monster_zombie")
            .unwrap();
        assert_eq!(zombie.targetname(), None);
    }

    #[test]
    fn noscript_skips_spawn_management() {
        let (mut map, series) = series_fixture();
        update_map_series_entity_logic(&mut map, &series, true);
        assert!(!map.entities.iter().any(|e| e.classname() == "trigger_relay"));
        assert!(!map.entities.iter().any(|e| e.classname() == "trigger_once"));
        let barney = map
            .entities
            .iter()
            .find(|e| e.classname() == "monster_barney")
            .unwrap();
        assert_eq!(barney.targetname(), None);
        // transitions are still rewritten
        assert!(map
            .entities
            .iter()
            .any(|e| e.classname() == "trigger_teleport"));
    }

    #[test]
    fn series_info_records_layout() {
        let (mut map, series) = series_fixture();
        update_map_series_entity_logic(&mut map, &series, false);
        let info = map
            .entities
            .iter()
            .find(|e| e.targetname() == Some("merge_info"))
            .unwrap();
        assert_eq!(info.get("merge_count"), Some("2"));
        assert_eq!(info.get("map_0"), Some("alpha"));
        assert_eq!(info.get("map_1"), Some("beta"));
        assert_eq!(info.get("map_1_mins"), Some("164 0 0"));
    }

    #[test]
    fn changelevel_to_unknown_map_is_left_alone() {
        let (mut map, series) = series_fixture();
        let mut change = named("trigger_changelevel", "", "beta");
        change.set("map", "gamma");
        map.entities.push(change);
        update_map_series_entity_logic(&mut map, &series, false);
        assert!(map
            .entities
            .iter()
            .any(|e| e.classname() == "trigger_changelevel" && e.get("map") == Some("gamma")));
    }
}
