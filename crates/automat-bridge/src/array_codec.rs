//! Array codec
//!
//! Conversion between the foreign N-dimensional array and the host
//! array, built on the value codec. Both directions walk the same
//! carry-increment index order (last dimension fastest); a per-element
//! failure aborts the whole operation.

use crate::codec;
use automat_core::array::{Bound, ForeignArray, IndexWalker};
use automat_core::error::BridgeResult;
use automat_core::host::{HostArray, HostValue};
use automat_core::value::WireValue;

/// Convert a foreign array to a host array.
///
/// The host array is shaped to the per-dimension extents; elements land
/// at the 1-based, bound-shifted host index.
pub fn decode_array(array: &ForeignArray) -> BridgeResult<HostArray> {
    let extents: Vec<u32> = array.bounds().iter().map(|b| b.extent).collect();
    let mut host = HostArray::new(extents);
    let mut host_indices = vec![0u32; array.rank()];
    for indices in IndexWalker::new(array.bounds()) {
        for (dim, index) in indices.iter().enumerate() {
            host_indices[dim] = (*index - array.bounds()[dim].lower) as u32 + 1;
        }
        if let Some(element) = array.get(&indices) {
            let decoded = codec::decode(element)?;
            host.put(&host_indices, decoded);
        }
    }
    Ok(host)
}

/// Convert a host array to a foreign array.
///
/// The foreign representation is zero-based in every dimension
/// regardless of the host's indexing convention. An empty
/// (zero-dimension) host array becomes a zero-length one-dimension
/// foreign array. Host nil elements become the tag-only empty value,
/// never an error tag.
pub fn encode_array(array: &HostArray) -> BridgeResult<WireValue> {
    if array.rank() == 0 {
        return Ok(WireValue::Array(ForeignArray::new(vec![
            Bound::zero_based(0),
        ])?));
    }
    let bounds: Vec<Bound> = array
        .extents()
        .iter()
        .map(|e| Bound::zero_based(*e))
        .collect();
    let mut foreign = ForeignArray::new(bounds.clone())?;
    let mut host_indices = vec![0u32; array.rank()];
    for indices in IndexWalker::new(&bounds) {
        for (dim, index) in indices.iter().enumerate() {
            host_indices[dim] = *index as u32 + 1;
        }
        let element = match array.get(&host_indices) {
            Some(HostValue::Nil) | None => WireValue::Empty,
            Some(element) => codec::encode(element, None, 1)?.value,
        };
        foreign.put(&indices, element)?;
    }
    Ok(WireValue::Array(foreign))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(extents: Vec<u32>) -> HostArray {
        let mut array = HostArray::new(extents.clone());
        let mut counter = 0;
        let bounds: Vec<Bound> = extents.iter().map(|e| Bound::zero_based(*e)).collect();
        for indices in IndexWalker::new(&bounds) {
            let host_indices: Vec<u32> = indices.iter().map(|i| *i as u32 + 1).collect();
            counter += 1;
            array.put(&host_indices, HostValue::str(counter.to_string()));
        }
        array
    }

    #[test]
    fn test_round_trips_across_shapes() {
        // 1 to 3 dimensions with extents drawn from {0, 1, 5}.
        let shapes: Vec<Vec<u32>> = vec![
            vec![0],
            vec![1],
            vec![5],
            vec![1, 5],
            vec![5, 5],
            vec![5, 0],
            vec![1, 1, 1],
            vec![5, 1, 5],
            vec![0, 1, 5],
        ];
        for shape in shapes {
            let original = filled(shape.clone());
            let encoded = encode_array(&original).unwrap();
            let WireValue::Array(foreign) = &encoded else {
                panic!("expected array value");
            };
            assert_eq!(foreign.rank(), shape.len());
            let decoded = decode_array(foreign).unwrap();
            assert_eq!(decoded, original, "shape {shape:?}");
        }
    }

    #[test]
    fn test_zero_dimension_encodes_as_empty_vector() {
        let encoded = encode_array(&HostArray::new(vec![])).unwrap();
        let WireValue::Array(foreign) = &encoded else {
            panic!("expected array value");
        };
        assert_eq!(foreign.rank(), 1);
        assert_eq!(foreign.len(), 0);
        // Decoding the empty case produces a zero-length array.
        let decoded = decode_array(foreign).unwrap();
        assert_eq!(decoded.rank(), 1);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_nil_elements_encode_as_empty_value() {
        let mut array = HostArray::new(vec![2]);
        array.put(&[1], HostValue::str("x"));
        // Slot 2 stays nil.
        let encoded = encode_array(&array).unwrap();
        let WireValue::Array(foreign) = &encoded else {
            panic!("expected array value");
        };
        assert_eq!(foreign.get(&[0]), Some(&WireValue::Str("x".to_string())));
        assert_eq!(foreign.get(&[1]), Some(&WireValue::Empty));
    }

    #[test]
    fn test_decode_shifts_foreign_lower_bounds() {
        let mut foreign =
            ForeignArray::new(vec![Bound { lower: 3, extent: 2 }]).unwrap();
        foreign.put(&[3], WireValue::I4(30)).unwrap();
        foreign.put(&[4], WireValue::I4(40)).unwrap();
        let decoded = decode_array(&foreign).unwrap();
        assert_eq!(decoded.get(&[1]), Some(&HostValue::str("30")));
        assert_eq!(decoded.get(&[2]), Some(&HostValue::str("40")));
    }

    #[test]
    fn test_element_failure_aborts_decode() {
        let mut foreign = ForeignArray::new(vec![Bound::zero_based(2)]).unwrap();
        foreign.put(&[0], WireValue::I4(1)).unwrap();
        foreign
            .put(&[1], WireValue::Opaque(automat_core::tag::Tag::Blob))
            .unwrap();
        assert!(decode_array(&foreign).is_err());
    }

    #[test]
    fn test_booleans_survive_the_array_path() {
        let array = HostArray::from_vec(vec![
            HostValue::Bool(true),
            HostValue::Bool(false),
        ]);
        let encoded = encode_array(&array).unwrap();
        let WireValue::Array(foreign) = &encoded else {
            panic!("expected array value");
        };
        assert_eq!(foreign.get(&[0]), Some(&WireValue::Bool(true)));
        let decoded = decode_array(foreign).unwrap();
        assert_eq!(decoded, array);
    }
}
