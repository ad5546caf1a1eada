//! Bayer-mosaic loss weights.

use crate::grid::{Grid, ShapeError, broadcast_shapes};

/// Per-pixel RGB weights of an RGGB mosaic keyed by absolute pixel parity.
///
/// Red sits on (even x, even y), blue on (odd x, odd y) and green on the
/// remaining two sites. The result has the broadcast shape of the inputs with
/// a trailing axis of 3.
pub fn bayer_mask(pix_x: &Grid<u32>, pix_y: &Grid<u32>) -> Result<Grid<f32>, ShapeError> {
    let shape = broadcast_shapes(&[pix_x.shape(), pix_y.shape()])?;
    let xs = pix_x.broadcast_to(&shape)?;
    let ys = pix_y.broadcast_to(&shape)?;

    let mut data = Vec::with_capacity(xs.len() * 3);
    for (&x, &y) in xs.as_slice().iter().zip(ys.as_slice()) {
        let (x_odd, y_odd) = (x % 2 == 1, y % 2 == 1);
        let r = !x_odd && !y_odd;
        let g = x_odd != y_odd;
        let b = x_odd && y_odd;
        data.extend([r as u8 as f32, g as u8 as f32, b as u8 as f32]);
    }

    let mut out_shape = shape;
    out_shape.push(3);
    Grid::new(out_shape, data)
}
