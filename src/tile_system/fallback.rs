use crate::tile_system::cache::TileCache;
use crate::tile_system::types::TileKey;

/// Square region of an ancestor tile image, in image pixels with the origin at
/// the top-left (north-west) corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRect {
    /// Tiles per axis the ancestor is split into, `2^levels`
    pub divisions: u32,
    pub column: u32,
    pub row: u32,
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl SubRect {
    /// Footprint of `key` inside its ancestor `levels` zoom steps up.
    pub fn for_descendant(key: TileKey, levels: u8, tile_size: u32) -> Self {
        let divisions = 1u32 << levels;
        let size = (tile_size / divisions).max(1);
        let column = key.x % divisions;
        let row = key.y % divisions;
        Self {
            divisions,
            column,
            row,
            x: column * size,
            y: row * size,
            size,
        }
    }
}

/// Coarser stand-in for a tile that is not cached yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Fallback<T> {
    pub source: TileKey,
    pub image: T,
    pub rect: SubRect,
}

/// Walk up to `depth` ancestor levels of `key` (never past `min_zoom`) and
/// return the first cached one with the sub-rectangle covering `key`.
///
/// Pure cache read: no network activity and no eviction protection for the
/// ancestor.
pub fn resolve_fallback<T: Clone>(
    cache: &TileCache<T>,
    key: TileKey,
    tile_size: u32,
    depth: u8,
    min_zoom: u8,
) -> Option<Fallback<T>> {
    // Beyond this many levels a sub-rectangle would be smaller than a pixel
    let max_levels = depth.min(tile_size.max(1).ilog2() as u8);

    (1..=max_levels)
        .filter_map(|levels| key.ancestor(levels))
        .take_while(|ancestor| ancestor.zoom >= min_zoom)
        .find_map(|ancestor| {
            let levels = key.zoom - ancestor.zoom;
            cache.get_for_fallback(&ancestor).map(|image| Fallback {
                source: ancestor,
                image,
                rect: SubRect::for_descendant(key, levels, tile_size),
            })
        })
}
