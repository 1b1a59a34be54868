//! static weight precomputation: run a profile's cost function over every
//! edge once and store the result in the profile's reserved column, so the
//! query path can use a plain column lookup.

use indexmap::IndexMap;

use super::cost_model::CostFunction;
use super::profile::Profile;
use super::profile_error::ProfileError;
use crate::model::network::AttrValue;
use crate::storage::graph_store::GraphStore;

/// batch size for weight-column updates.
pub const WEIGHT_BATCH_SIZE: usize = 1000;

/// precompute static weights for every profile flagged `precalculate`,
/// under each profile's default arguments.
pub fn precalculate_weights(
    store: &mut GraphStore,
    profiles: &[Profile],
    mut counter: Option<&mut dyn FnMut(usize)>,
) -> Result<(), ProfileError> {
    for profile in profiles {
        if !profile.precalculate {
            continue;
        }
        let cost = profile.cost_function(&IndexMap::new())?;
        log::info!(
            "precalculating weights for profile {} into {}",
            profile.id,
            profile.weight_column()
        );
        precalculate_weight(
            store,
            &profile.weight_column(),
            cost.as_ref(),
            counter.as_mut().map(|c| c as &mut dyn FnMut(usize)),
        )?;
    }
    Ok(())
}

/// stream all edges, computing `cost(u, v, d)` for each and writing the
/// result into `column` in batches. a `None` cost is stored as SQL NULL
/// (infinite cost at lookup time).
pub fn precalculate_weight(
    store: &mut GraphStore,
    column: &str,
    cost: &dyn CostFunction,
    mut counter: Option<&mut dyn FnMut(usize)>,
) -> Result<(), ProfileError> {
    let mut offset = 0;
    loop {
        let batch = store.edges_page(offset, WEIGHT_BATCH_SIZE)?;
        if batch.is_empty() {
            break;
        }
        let n = batch.len();

        let updates: Vec<(String, String, IndexMap<String, AttrValue>)> = batch
            .into_iter()
            .map(|(u, v, d)| {
                let weight = match cost.cost(&u, &v, &d) {
                    Some(w) => AttrValue::Float(w),
                    None => AttrValue::Null,
                };
                let mut set = IndexMap::new();
                set.insert(column.to_string(), weight);
                (u, v, set)
            })
            .collect();
        store.update_edges(&updates)?;

        offset += n;
        if let Some(cb) = counter.as_mut() {
            cb(n);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::network::{EdgeRecord, EdgeTuple};
    use crate::model::profile::cost_model::DistanceCost;
    use crate::storage::graph_store::BATCH_SIZE;
    use geo::LineString;

    fn edge(u: &str, v: &str, length: Option<f64>) -> EdgeTuple {
        let mut attrs = IndexMap::new();
        if let Some(length) = length {
            attrs.insert("length".to_string(), AttrValue::Float(length));
        }
        (
            u.to_string(),
            v.to_string(),
            EdgeRecord::new(LineString::from(vec![(0.0, 0.0), (0.001, 0.0)]), attrs),
        )
    }

    #[test]
    fn test_precalculate_weight_fidelity() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GraphStore::create(dir.path().join("graph.gpkg")).unwrap();
        store
            .add_edges(
                vec![
                    edge("a", "b", Some(72.8)),
                    edge("b", "c", Some(70.7)),
                    edge("c", "d", Some(12.5)),
                    edge("d", "e", None),
                ],
                BATCH_SIZE,
                None,
            )
            .unwrap();

        let mut counted = 0;
        let mut counter = |n: usize| counted += n;
        precalculate_weight(&mut store, "_weight_distance", &DistanceCost, Some(&mut counter))
            .unwrap();
        assert_eq!(counted, 4);

        for ((u, v), expected) in [
            (("a", "b"), Some(72.8)),
            (("b", "c"), Some(70.7)),
            (("c", "d"), Some(12.5)),
            // a None cost round-trips as NULL, read back as infinite
            (("d", "e"), None),
        ] {
            let d = store.get_edge(u, v).unwrap();
            assert_eq!(d.weight("_weight_distance"), expected);
        }
    }

    #[test]
    fn test_precalculate_batches_large_graphs() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = GraphStore::create(dir.path().join("graph.gpkg")).unwrap();
        let many: Vec<EdgeTuple> = (0..2500)
            .map(|i| edge(&format!("n{}", i), &format!("n{}", i + 1), Some(1.0)))
            .collect();
        store.add_edges(many, BATCH_SIZE, None).unwrap();

        precalculate_weight(&mut store, "_weight_distance", &DistanceCost, None).unwrap();
        let total = store.size_weighted("_weight_distance").unwrap();
        assert!((total - 2500.0).abs() < 1e-9);
    }
}
