//! Partitioning of an owned space into colored sub-problems.
//!
//! Governed elements of the base space are dealt out to the palette in contiguous
//! blocks of `(size - marginal) / palette.len()` elements, the last color taking the
//! remainder. Ghost elements keep the color of their owner. For each color the
//! subjugator derives the induced sub-space, with a margin of ghosts renamed to the
//! color and linked to their owner's name, and the induced sub-graph.

use crate::parallel::Comm;
use crate::topology::{Element, Family, Neighbour, Space};

pub struct Subjugator<'a, E: Element, N: Neighbour<E>> {
    base: &'a Space<E>,
    adjacent: &'a Family<E, N>,
    palette: Vec<u32>,
    color: Vec<u32>,
}

impl<'a, E: Element, N: Neighbour<E>> Subjugator<'a, E, N> {
    pub fn new(base: &'a Space<E>, adjacent: &'a Family<E, N>, palette: &[u32]) -> Self {
        let mut s = Self { base, adjacent, palette: palette.to_vec(), color: Vec::new() };
        s.setup();
        s
    }

    /// Multi-level variant: `intra` connects the ranks of one region, `inter` (held by
    /// region leaders, intra rank 0) connects the leaders. Colors of margin elements
    /// owned by another region are fetched from that region's leader and broadcast
    /// within the region.
    pub fn with_regions<C: Comm, D: Comm>(
        base: &'a Space<E>,
        adjacent: &'a Family<E, N>,
        palette: &[u32],
        intra: &C,
        inter: Option<&D>,
    ) -> Self {
        let mut s = Self::new(base, adjacent, palette);
        s.marginal_setup(intra, inter);
        s
    }

    fn setup(&mut self) {
        self.color = self.base.iter().map(|(e, _)| e.color()).collect();
        if self.palette.is_empty() {
            return;
        }
        let partition = (self.base.size() - self.base.marginal_size()) / self.palette.len();
        let (mut cnt, mut i) = (0, 0);
        let mut color = vec![0; self.base.size()];
        for (e, k) in self.base.iter() {
            if self.base.governs(e) {
                color[k] = self.palette[i];
                cnt += 1;
                if partition <= cnt && i + 1 < self.palette.len() {
                    i += 1;
                    cnt = 0;
                }
            } else {
                color[k] = e.color();
            }
        }
        self.color = color;
    }

    fn marginal_setup<C: Comm, D: Comm>(&mut self, intra: &C, inter: Option<&D>) {
        if let (0, Some(inter)) = (intra.rank(), inter) {
            let size = inter.size();
            let me = inter.rank();
            let mut row = vec![0u64; size];
            for (_, y) in self.base.ghosts() {
                let c = y.color() as usize;
                assert!(c < size, "ghost owner {} outside {} regions", c, size);
                row[c] += 1;
            }
            let mnn = inter.all_gather(&row);

            // ask every owning region for the colors of our ghosts
            let asks: Vec<(usize, Vec<u64>)> = (0..size)
                .filter(|&r| mnn[me * size + r] > 0)
                .map(|r| {
                    let ids = self.base.ghosts().filter(|(_, y)| y.color() as usize == r).map(|(_, y)| y.id()).collect();
                    (r, ids)
                })
                .collect();
            let owed: Vec<(usize, usize)> = (0..size)
                .filter(|&r| mnn[r * size + me] > 0)
                .map(|r| (r, mnn[r * size + me] as usize))
                .collect();
            let asked = inter.exchange(&owed, &asks);

            let replies: Vec<(usize, Vec<u32>)> = owed
                .iter()
                .zip(&asked)
                .map(|(&(r, _), ids)| {
                    (r, ids.iter().map(|&id| self.color[self.base.index(&E::from_id(id))]).collect())
                })
                .collect();
            let expect: Vec<(usize, usize)> = asks.iter().map(|(r, ids)| (*r, ids.len())).collect();
            let answers = inter.exchange(&expect, &replies);

            for ((_, ids), cols) in asks.iter().zip(answers) {
                for (&id, c) in ids.iter().zip(cols) {
                    let k = self.base.external_index(&E::from_id(id));
                    self.color[k] = c;
                }
            }
            log::debug!("region {}: resolved colors of {} margin elements", me, self.base.marginal_size());
        }
        intra.barrier();
        intra.broadcast(&mut self.color, 0);
    }

    pub fn palette(&self) -> &[u32] {
        &self.palette
    }

    /// Color assigned to `x`, which must belong to the base space.
    pub fn color(&self, x: &E) -> u32 {
        self.color[self.base.index(x)]
    }

    pub fn try_color(&self, x: &E) -> Option<u32> {
        self.base.get_index(x).map(|k| self.color[k])
    }

    fn block(&self, color: u32) -> Space<E> {
        let mut s = Space::new();
        for (e, k) in self.base.iter() {
            if self.color[k] == color {
                s.join(e.clone());
            }
        }
        s
    }

    /// The elements of `color` renamed to `color`, plus their off-block neighbours as
    /// ghosts linked to the owner color.
    pub fn subspace(&self, color: u32) -> Space<E> {
        let base = self.block(color);
        let mut sub = Space::new();
        let mut margin = Space::new();
        for x in base.elements() {
            sub.join(x.recolor(color));
            for y in self.adjacent.neighbourhood(x, 0).elements() {
                let local = y.recolor(color);
                if base.contains(y) || margin.contains(&local) {
                    continue;
                }
                if let Some(c) = self.try_color(y) {
                    margin.join_ghost(local, y.recolor(c));
                }
            }
        }
        &sub | &margin
    }

    /// Adjacency of the block of `color` and of its margin, restricted to `sub`.
    pub fn subfamily(&self, color: u32, sub: &Space<E>) -> Family<E, N> {
        let base = self.block(color);
        let mut margin = Space::new();
        let mut adjs = Family::new();
        for x in base.elements() {
            let mut neigh = N::from_element(x.recolor(color));
            for y in self.adjacent.neighbourhood(x, 0).elements() {
                let local = y.recolor(color);
                if !base.contains(y) && !margin.contains(y) && self.try_color(y).is_some() {
                    margin.join_ghost(y.clone(), local.clone());
                }
                if sub.contains(&local) {
                    neigh.join(local);
                }
            }
            adjs.join(neigh);
        }
        for (y, local) in margin.ghosts() {
            let mut neigh = N::from_element(local.clone());
            for z in self.adjacent.neighbourhood(y, 0).elements() {
                let z1 = z.recolor(color);
                if sub.contains(&z1) {
                    neigh.join(z1);
                }
            }
            adjs.join(neigh);
        }
        adjs
    }
}
