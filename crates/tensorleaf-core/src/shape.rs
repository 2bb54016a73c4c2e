use std::fmt;

// TensorShape: dimension sizes with 0 meaning "not known yet"
//
// A parameter can be declared before all of its dimensions are known:
//
//   [0, 784]    output dimension unknown, to be inferred later
//   [0, 0]      rank 2, nothing known
//   []          nothing known at all, not even the rank
//
// A dimension value of 0 is therefore a sentinel, never a real size.
// The shape is "fully known" once it has at least one dimension and none
// of them is 0. The empty shape counts as unknown (zero elements), which is
// what lets inference adopt a peer's shape wholesale.
//
// MATRIX VIEW:
//
// Buffers are 2-D and column-major. A shape maps onto a matrix as
//   rows = dims[0]
//   cols = product(dims[1..])   (1 for a rank-1 shape)
// so [4, 2, 3] is stored as a 4 x 6 matrix, and reshaping between the two
// never moves data.

/// Ordered dimension sizes, where 0 marks a dimension still to be inferred.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TensorShape(Vec<usize>);

impl TensorShape {
    /// Create a new shape from a vector of dimension sizes.
    pub fn new(dims: Vec<usize>) -> Self {
        TensorShape(dims)
    }

    /// The empty shape: rank 0, nothing known.
    pub fn empty() -> Self {
        TensorShape(Vec::new())
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements: the product of all dimensions, or 0 if any
    /// dimension is unknown or the shape is empty.
    pub fn elem_count(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.iter().product()
    }

    /// True when every dimension is known (and there is at least one).
    pub fn is_fully_known(&self) -> bool {
        self.elem_count() != 0
    }

    /// True when at least one dimension carries a real size.
    pub fn has_any_known_dim(&self) -> bool {
        self.0.iter().any(|&d| d != 0)
    }

    /// Positions of the dimensions that are still unknown.
    pub fn unknown_positions(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Size of a specific dimension.
    pub fn dim(&self, d: usize) -> crate::Result<usize> {
        self.0.get(d).copied().ok_or_else(|| {
            crate::Error::invalid_argument(format!(
                "dimension {} out of range for shape {} of rank {}",
                d,
                self,
                self.rank()
            ))
        })
    }

    /// Append a trailing dimension.
    pub fn append(&mut self, dim: usize) {
        self.0.push(dim);
    }

    /// (rows, cols) of the column-major matrix that stores this shape.
    pub fn as_matrix_dims(&self) -> (usize, usize) {
        match self.0.split_first() {
            None => (0, 0),
            Some((&rows, rest)) => (rows, rest.iter().product()),
        }
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            if *d == 0 {
                write!(f, "*")?;
            } else {
                write!(f, "{}", d)?;
            }
        }
        write!(f, "]")
    }
}

// Convenient From implementations

impl From<usize> for TensorShape {
    fn from(d: usize) -> Self {
        TensorShape(vec![d])
    }
}

impl From<(usize, usize)> for TensorShape {
    fn from((d0, d1): (usize, usize)) -> Self {
        TensorShape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for TensorShape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        TensorShape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for TensorShape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        TensorShape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(v: Vec<usize>) -> Self {
        TensorShape(v)
    }
}

impl From<&[usize]> for TensorShape {
    fn from(s: &[usize]) -> Self {
        TensorShape(s.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for TensorShape {
    fn from(a: [usize; N]) -> Self {
        TensorShape(a.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_shape_is_unknown() {
        let s = TensorShape::empty();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.elem_count(), 0);
        assert!(!s.is_fully_known());
        assert!(!s.has_any_known_dim());
        assert_eq!(s.as_matrix_dims(), (0, 0));
    }

    #[test]
    fn test_partial_shape() {
        let s = TensorShape::from((5, 0));
        assert_eq!(s.elem_count(), 0);
        assert!(!s.is_fully_known());
        assert!(s.has_any_known_dim());
        assert_eq!(s.unknown_positions(), vec![1]);
    }

    #[test]
    fn test_matrix_view() {
        assert_eq!(TensorShape::from(7).as_matrix_dims(), (7, 1));
        assert_eq!(TensorShape::from((3, 4)).as_matrix_dims(), (3, 4));
        assert_eq!(TensorShape::from((4, 2, 3)).as_matrix_dims(), (4, 6));
    }

    #[test]
    fn test_display_marks_unknown() {
        assert_eq!(TensorShape::from((3, 0)).to_string(), "[3 x *]");
        assert_eq!(TensorShape::empty().to_string(), "[]");
    }

    #[test]
    fn test_append() {
        let mut s = TensorShape::from((2, 3));
        s.append(5);
        assert_eq!(s.dims(), &[2, 3, 5]);
        assert_eq!(s.elem_count(), 30);
    }
}
