//! Minimal n-dimensional arrays with NumPy-style broadcasting.
//!
//! Pixel and camera selections come in arbitrary but mutually broadcastable
//! shapes (e.g. patch origins `[n, 1, 1]` plus patch offsets `[p, p]`).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    Size {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("shapes {0:?} and {1:?} cannot be broadcast together")]
    Incompatible(Vec<usize>, Vec<usize>),
    #[error("cannot concatenate shapes {0:?} and {1:?} along the leading axis")]
    Concat(Vec<usize>, Vec<usize>),
}

/// Row-major array of `T` with an explicit shape. A zero-dimensional shape
/// holds a single scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Copy> Grid<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self, ShapeError> {
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(ShapeError::Size {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn scalar(value: T) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// One-dimensional grid over `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn from_fn(shape: Vec<usize>, mut f: impl FnMut(usize) -> T) -> Self {
        let len = shape.iter().product::<usize>();
        Self {
            shape,
            data: (0..len).map(&mut f).collect(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn map<U: Copy>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Same data viewed with another shape of equal size.
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, ShapeError> {
        Self::new(shape, self.data)
    }

    /// Materialize this grid broadcast to `shape`.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Grid<T>, ShapeError> {
        if self.shape == shape {
            return Ok(self.clone());
        }
        let target = broadcast_shapes(&[&self.shape, shape])?;
        if target != shape {
            return Err(ShapeError::Incompatible(self.shape.clone(), shape.to_vec()));
        }

        // Source stride per target axis, zero where the source axis is missing or of size 1.
        let offset = shape.len() - self.shape.len();
        let mut strides = vec![0usize; shape.len()];
        let mut stride = 1;
        for (axis, &dim) in self.shape.iter().enumerate().rev() {
            if dim != 1 {
                strides[axis + offset] = stride;
            }
            stride *= dim;
        }

        let len = shape.iter().product::<usize>();
        let mut data = Vec::with_capacity(len);
        let mut index = vec![0usize; shape.len()];
        for _ in 0..len {
            let src = index.iter().zip(&strides).map(|(i, s)| i * s).sum::<usize>();
            data.push(self.data[src]);
            for axis in (0..shape.len()).rev() {
                index[axis] += 1;
                if index[axis] < shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        Ok(Grid {
            shape: shape.to_vec(),
            data,
        })
    }

    /// Join two grids along their leading axis.
    pub fn concat(&self, other: &Grid<T>) -> Result<Grid<T>, ShapeError> {
        if self.shape.is_empty() || other.shape.is_empty() || self.shape[1..] != other.shape[1..] {
            return Err(ShapeError::Concat(self.shape.clone(), other.shape.clone()));
        }
        let mut shape = self.shape.clone();
        shape[0] += other.shape[0];
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        Ok(Grid { shape, data })
    }
}

/// Shape resulting from broadcasting all `shapes` together.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>, ShapeError> {
    let rank = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1usize; rank];
    for shape in shapes {
        let offset = rank - shape.len();
        for (axis, &dim) in shape.iter().enumerate() {
            let slot = &mut out[axis + offset];
            if *slot == 1 {
                *slot = dim;
            } else if dim != 1 && dim != *slot {
                return Err(ShapeError::Incompatible(out.clone(), shape.to_vec()));
            }
        }
    }
    Ok(out)
}

/// Integer pixel coordinates of a `width x height` image as two `[height, width]` grids.
pub fn pixel_coordinates(width: usize, height: usize) -> (Grid<u32>, Grid<u32>) {
    let shape = vec![height, width];
    let xs = Grid::from_fn(shape.clone(), |i| (i % width.max(1)) as u32);
    let ys = Grid::from_fn(shape, |i| (i / width.max(1)) as u32);
    (xs, ys)
}
