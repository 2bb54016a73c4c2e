// Shape inference: filling in unknown (0) dimensions from evidence
//
// Two kinds of evidence resolve a partially known shape:
//
// 1. LOADED DATA (rows R, cols C of a text matrix)
//
//    Only applies while the shape has zero elements.
//      - an empty shape becomes [0]; a rank-1 shape becomes [.., 0] when C != 1
//      - dims[0], if unknown, becomes R
//      - dims[1..] must multiply to C; a single unknown among them is solved
//        as C / product(known), and must divide evenly
//      - two or more unknowns among dims[1..] cannot be solved
//
//    [0, 0, 3] with a 4 x 6 matrix  -> [4, 2, 3]
//    [0, 0, 0, 3] with a 4 x 6 matrix -> error (too many unknown dimensions)
//
// 2. A PEER'S SHAPE (the other operand of an operation, once it is known)
//
//      - own shape fully known            -> nothing to do
//      - peer shape not fully known       -> nothing to learn
//      - own shape has no known dimension -> adopt the peer wholesale
//      - ranks differ                     -> skip; validation reports it
//      - otherwise copy the peer's value into each unknown position
//
// Both are pure functions over shapes; the parameter node applies the result.

use tensorleaf_core::{invalid_argument, Result, TensorShape};

/// Resolve `shape` against an R x C data matrix.
///
/// Returns `shape` unchanged when it already has a nonzero element count;
/// any disagreement with the data is then left to the size check that
/// follows loading. `context` names the node in error messages.
pub fn infer_from_data(
    shape: &TensorShape,
    rows: usize,
    cols: usize,
    context: &str,
) -> Result<TensorShape> {
    if shape.elem_count() != 0 {
        return Ok(shape.clone());
    }

    let mut dims = shape.dims().to_vec();
    if dims.is_empty() {
        dims.push(0);
    }
    if dims.len() == 1 && cols != 1 {
        dims.push(0);
    }

    // A known dims[0] that disagrees with R is caught by the size check.
    if dims[0] == 0 {
        dims[0] = rows;
    }

    let mut unknown: Option<usize> = None;
    let mut known_product = 1usize;
    for (k, &d) in dims.iter().enumerate().skip(1) {
        if d != 0 {
            known_product *= d;
        } else if unknown.is_none() {
            unknown = Some(k);
        } else {
            invalid_argument!(
                "{context}: specified shape {shape} cannot be inferred: too many unknown dimensions"
            );
        }
    }

    if let Some(k) = unknown {
        let solved = cols / known_product;
        if solved * known_product != cols || solved == 0 {
            invalid_argument!(
                "{context}: specified shape {shape} cannot be inferred: tensor shape cannot hold a [{rows} x {cols}] matrix"
            );
        }
        dims[k] = solved;
    }

    Ok(TensorShape::new(dims))
}

/// Result of offering a peer's shape to a partially known shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerInference {
    /// The own shape was already fully known.
    AlreadyKnown,
    /// The peer's shape has unknown dimensions itself.
    PeerUnknown,
    /// Ranks disagree. Nothing was changed; the mismatch is for the
    /// caller's validation to report.
    RankMismatch { own: usize, peer: usize },
    /// The shape to adopt.
    Resolved(TensorShape),
}

/// Offer `peer` as evidence for the unknown dimensions of `shape`.
pub fn infer_from_peer(shape: &TensorShape, peer: &TensorShape) -> PeerInference {
    if shape.is_fully_known() {
        return PeerInference::AlreadyKnown;
    }
    if !peer.is_fully_known() {
        return PeerInference::PeerUnknown;
    }

    // Nothing specified at all: take the peer as is, without a rank check,
    // since the node may have been declared as an empty vector.
    if !shape.has_any_known_dim() {
        return PeerInference::Resolved(peer.clone());
    }

    if shape.rank() != peer.rank() {
        return PeerInference::RankMismatch {
            own: shape.rank(),
            peer: peer.rank(),
        };
    }

    let dims = shape
        .dims()
        .iter()
        .zip(peer.dims())
        .map(|(&own, &theirs)| if own == 0 { theirs } else { own })
        .collect();
    PeerInference::Resolved(TensorShape::new(dims))
}
