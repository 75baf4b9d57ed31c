//! # Property-Based Tests
//!
//! Laws of the chunk protocol, the manifest and the registry.

use cadstore::codec::tcode::TCODE_VERSIONED;
use cadstore::manifest::IdentityRequest;
use cadstore::{
    ArchiveReader, ArchiveVersion, ArchiveWriter, ChunkVersion, Component, ComponentIdentity,
    ComponentPayload, ComponentType, Id, ItemFilter, Layer, Manifest, ManifestMap, ModelGeometry,
    NIL_ID, NameHash, ReadOptions, Registry, WriteOptions,
};
use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use std::collections::BTreeSet;

const TCODE_FIELDS: u32 = TCODE_VERSIONED | 0x0F10;
const TCODE_NEXT: u32 = TCODE_VERSIONED | 0x0F11;

fn id_of(n: usize) -> Id {
    let mut id = [0xA5u8; 16];
    id[..8].copy_from_slice(&(n as u64 + 1).to_le_bytes());
    id
}

fn archive_version() -> impl Strategy<Value = ArchiveVersion> {
    prop::sample::select(ArchiveVersion::ALL.to_vec())
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Written components read back with the same ids, names and references.
    #[test]
    fn round_trip_preserves_identity_and_content(
        names in btree_set("[a-z]{1,8}", 1..12),
        placements in vec(any::<prop::sample::Index>(), 0..20),
        blobs in vec(vec(any::<u8>(), 0..32), 0..20),
        version in archive_version(),
    ) {
        let names: Vec<String> = names.into_iter().map(|n| format!("L {n}")).collect();
        let mut model = Registry::new();
        for (i, name) in names.iter().enumerate() {
            model.add(Component::new(Layer::default()).with_name(name.clone()).with_id(id_of(i)), false).unwrap();
        }
        let mut expected = Vec::new();
        for (j, (slot, blob)) in placements.iter().zip(&blobs).enumerate() {
            let layer = id_of(slot.index(names.len()));
            let id = id_of(1000 + j);
            let geometry = ModelGeometry { layer_id: layer, geometry: blob.clone(), ..ModelGeometry::default() };
            model.add(Component::new(geometry).with_id(id), false).unwrap();
            expected.push((id, layer, blob.clone()));
        }

        let bytes = model.to_bytes(&WriteOptions::target(version)).unwrap();
        let (loaded, report) = Registry::from_bytes(&bytes, &ReadOptions::strict()).unwrap();
        prop_assert!(report.is_clean(), "{:?}", report);

        prop_assert_eq!(loaded.count(ComponentType::Layer), names.len());
        for (i, name) in names.iter().enumerate() {
            let layer = loaded.component_from_id(ComponentType::Layer, &id_of(i));
            prop_assert!(layer.is_some());
            let stored = layer.unwrap().component().unwrap().name().to_string();
            prop_assert_eq!(&stored, name);
        }

        prop_assert_eq!(loaded.count(ComponentType::ModelGeometry), expected.len());
        for (id, layer, blob) in &expected {
            let component = loaded.component_from_id(ComponentType::ModelGeometry, id).unwrap();
            match component.component().unwrap().payload() {
                ComponentPayload::ModelGeometry(g) => {
                    prop_assert_eq!(&g.layer_id, layer);
                    prop_assert_eq!(&g.geometry, blob);
                }
                other => prop_assert!(false, "unexpected payload {:?}", other),
            }
        }
    }

    /// Closing a partly read chunk always lands on the next sibling.
    #[test]
    fn end_read_chunk_lands_on_declared_end(
        fields in vec(any::<i32>(), 1..16),
        read in any::<prop::sample::Index>(),
        trailer in any::<u64>(),
        version in archive_version(),
    ) {
        let mut w = ArchiveWriter::new(version);
        w.write_chunk(TCODE_FIELDS, ChunkVersion::new(1, fields.len() as i32), |w| {
            for f in &fields {
                w.write_i32(*f);
            }
            Ok(())
        }).unwrap();
        w.write_chunk(TCODE_NEXT, ChunkVersion::new(1, 0), |w| {
            w.write_u64(trailer);
            Ok(())
        }).unwrap();
        let bytes = w.finish().unwrap();

        let k = read.index(fields.len());
        let mut r = ArchiveReader::open(&bytes).unwrap();
        let prefix = r.read_expected_chunk(TCODE_FIELDS, |r, _| {
            (0..k).map(|_| r.read_i32("field")).collect::<Result<Vec<_>, _>>()
        }).unwrap();
        prop_assert_eq!(&prefix[..], &fields[..k]);

        let next = r.read_expected_chunk(TCODE_NEXT, |r, _| r.read_u64("trailer")).unwrap();
        prop_assert_eq!(next, trailer);
        prop_assert!(r.at_chunk_end());
    }

    /// Colliding names are made distinct and stay retrievable.
    #[test]
    fn colliding_names_are_disambiguated(names in vec("[ab]{1,2}", 1..30)) {
        let mut manifest = Manifest::new();
        let mut assigned = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let request = IdentityRequest::new(ComponentType::Material, id_of(i), name);
            let item = manifest.add(&request, true, None).unwrap();
            assigned.push((*item.id(), item.name().to_string()));
        }

        let distinct: BTreeSet<&str> = assigned.iter().map(|(_, n)| n.as_str()).collect();
        prop_assert_eq!(distinct.len(), names.len());
        for (id, name) in &assigned {
            let found = manifest.item_from_name(ComponentType::Material, &NIL_ID, name);
            prop_assert!(found.is_some());
            prop_assert_eq!(found.unwrap().id(), id);
        }
    }

    /// Pairs are found from either side.
    #[test]
    fn map_pairs_are_bidirectional(count in 1usize..40) {
        let mut map = ManifestMap::new();
        let ty = ComponentType::Layer;
        for i in 0..count {
            let source = ComponentIdentity::new(ty, id_of(i), i as i32, NameHash::EMPTY);
            let destination = ComponentIdentity::new(ty, id_of(500 + i), 100 + i as i32, NameHash::EMPTY);
            map.add_pair(source, destination).unwrap();
        }
        prop_assert_eq!(map.len(), count);
        for i in 0..count {
            let forward = map.map_item_from_source_id(&id_of(i)).unwrap();
            prop_assert_eq!(forward.destination().id, id_of(500 + i));
            let backward = map.map_item_from_destination_id(&id_of(500 + i)).unwrap();
            prop_assert_eq!(backward.source().id, id_of(i));
            prop_assert_eq!(
                map.map_item_from_destination_index(ty, 100 + i as i32).unwrap().source().index,
                i as i32
            );
        }
    }

    /// Mutations raise the content version, and an iterator visits every
    /// survivor exactly once when components ahead of it are removed.
    #[test]
    fn iteration_visits_survivors_once(
        count in 2usize..24,
        doomed in vec(any::<prop::sample::Index>(), 0..12),
    ) {
        let mut model = Registry::new();
        let mut version = model.content_version();
        let mut refs = Vec::new();
        for i in 0..count {
            let component = Component::new(Layer::default()).with_name(format!("L{i}")).with_id(id_of(i));
            refs.push(model.add(component, false).unwrap());
            prop_assert!(model.content_version() > version);
            version = model.content_version();
        }

        let mut it = model.iterator(ComponentType::Layer, ItemFilter::ACTIVE);
        let first = it.next(&model).unwrap();
        prop_assert_eq!(&first, &refs[0]);

        let mut removed = BTreeSet::new();
        for pick in &doomed {
            let i = 1 + pick.index(count - 1);
            if removed.insert(i) {
                model.remove(ComponentType::Layer, &id_of(i)).unwrap();
                prop_assert!(model.content_version() > version);
                version = model.content_version();
            }
        }

        let mut visited = vec![first];
        while let Some(r) = it.next(&model) {
            visited.push(r);
        }
        let expected: Vec<_> = (0..count)
            .filter(|i| !removed.contains(i))
            .map(|i| refs[i].clone())
            .collect();
        prop_assert_eq!(visited, expected);
    }
}
