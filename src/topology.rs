use crate::config::Boundary;

/// Number of oriented neighbor slots of a grid mesh: `+x, -x, +y, -y, +z, -z`.
pub const GRID_DIRECTIONS: usize = 6;

/// Direction from the neighbor back to the source mesh. Directions are laid
/// out in opposed pairs, so the involution is a single bit flip.
#[inline]
pub fn opposed(direction: usize) -> usize {
    direction ^ 1
}

/// Neighborhood queries shared by both mesh spaces. Slots index a mesh's
/// oriented neighbor list; a grid mesh always has six slots, some of which
/// may be empty under reflecting boundaries.
pub trait Space {
    fn n_meshes(&self) -> usize;
    fn neighbor_slots(&self, mesh: usize) -> usize;
    fn neighbor(&self, mesh: usize, slot: usize) -> Option<usize>;
}

pub struct GridSpace {
    width: usize,
    height: usize,
    depth: usize,
    neighbors: Vec<Option<usize>>,
}

impl GridSpace {
    pub fn new(width: usize, height: usize, depth: usize, boundaries: [Boundary; 3]) -> Self {
        let n_meshes = width * height * depth;
        let mut neighbors = vec![None; n_meshes * GRID_DIRECTIONS];
        for mesh in 0..n_meshes {
            let x = (mesh % width) as isize;
            let y = (mesh / width % height) as isize;
            let z = (mesh / (width * height)) as isize;
            for direction in 0..GRID_DIRECTIONS {
                neighbors[mesh * GRID_DIRECTIONS + direction] =
                    neighbor_index(x, y, z, direction, width, height, depth, boundaries);
            }
        }
        Self {
            width,
            height,
            depth,
            neighbors,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn neighbor_index(
    x: isize,
    y: isize,
    z: isize,
    direction: usize,
    width: usize,
    height: usize,
    depth: usize,
    boundaries: [Boundary; 3],
) -> Option<usize> {
    let (w, h, d) = (width as isize, height as isize, depth as isize);
    let (mut xn, mut yn, mut zn) = (x, y, z);
    match direction {
        0 => xn += 1,
        1 => xn -= 1,
        2 => yn += 1,
        3 => yn -= 1,
        4 => zn += 1,
        5 => zn -= 1,
        _ => unreachable!("grid direction out of range"),
    }
    if boundaries[0] == Boundary::Periodic {
        xn = (xn + w) % w;
    }
    if boundaries[1] == Boundary::Periodic {
        yn = (yn + h) % h;
    }
    if boundaries[2] == Boundary::Periodic {
        zn = (zn + d) % d;
    }
    if (0..w).contains(&xn) && (0..h).contains(&yn) && (0..d).contains(&zn) {
        Some((w * h * zn + w * yn + xn) as usize)
    } else {
        None
    }
}

impl Space for GridSpace {
    fn n_meshes(&self) -> usize {
        self.width * self.height * self.depth
    }

    fn neighbor_slots(&self, _mesh: usize) -> usize {
        GRID_DIRECTIONS
    }

    #[inline]
    fn neighbor(&self, mesh: usize, slot: usize) -> Option<usize> {
        self.neighbors[mesh * GRID_DIRECTIONS + slot]
    }
}

/// Undirected edge between two meshes, annotated with the contact surface
/// and the center-to-center distance.
#[derive(Clone, Copy, Debug)]
pub struct GraphEdge {
    pub a: usize,
    pub b: usize,
    pub surface: f64,
    pub distance: f64,
}

pub struct GraphSpace {
    n_nodes: usize,
    neighbor_index: Vec<Vec<usize>>,
    neighbor_surface: Vec<Vec<f64>>,
    neighbor_distance: Vec<Vec<f64>>,
}

impl GraphSpace {
    /// Each edge is registered on both endpoints; a node's slot order is the
    /// order in which its edges appear in the input.
    pub fn new(n_nodes: usize, edges: &[GraphEdge]) -> Self {
        let mut neighbor_index = vec![Vec::new(); n_nodes];
        let mut neighbor_surface = vec![Vec::new(); n_nodes];
        let mut neighbor_distance = vec![Vec::new(); n_nodes];
        for edge in edges {
            neighbor_index[edge.a].push(edge.b);
            neighbor_index[edge.b].push(edge.a);
            neighbor_surface[edge.a].push(edge.surface);
            neighbor_surface[edge.b].push(edge.surface);
            neighbor_distance[edge.a].push(edge.distance);
            neighbor_distance[edge.b].push(edge.distance);
        }
        Self {
            n_nodes,
            neighbor_index,
            neighbor_surface,
            neighbor_distance,
        }
    }

    pub fn edge_attrs(&self, mesh: usize, slot: usize) -> (f64, f64) {
        (
            self.neighbor_surface[mesh][slot],
            self.neighbor_distance[mesh][slot],
        )
    }
}

impl Space for GraphSpace {
    fn n_meshes(&self) -> usize {
        self.n_nodes
    }

    fn neighbor_slots(&self, mesh: usize) -> usize {
        self.neighbor_index[mesh].len()
    }

    #[inline]
    fn neighbor(&self, mesh: usize, slot: usize) -> Option<usize> {
        self.neighbor_index[mesh].get(slot).copied()
    }
}
