/*****************************************************************************************[symmetry.rs]
Copyright (c) 2003-2006, Niklas Een, Niklas Sorensson (MiniSat)
Copyright (c) 2007-2010, Niklas Sorensson (MiniSat)

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

//! Per-generator state for symmetry propagation.
//!
//! A [`Symmetry`] is a permutation π over literals with `π(¬l) = ¬π(l)`.
//! It watches the literals of its domain on the trail and classifies itself
//! as active, inactive or permanently inactive against the current
//! assignment. When active, it offers literals whose symmetrical
//! counterpart can be derived by applying π to an existing reason clause.

use crate::clause::{lbool, LMap, Lit, Var};
use crate::core::VarState;
use crate::intmap::IntSet;
use smallvec::SmallVec;

/// Identifier of a symmetry generator, assigned by the solver in
/// registration order.
pub type SymId = u32;

/// The set of symmetries under which a symmetry-tagged learnt clause stays
/// sound, stored as sorted ids.
#[derive(Debug, Clone, Default)]
pub struct CompatSet {
    ids: SmallVec<[SymId; 4]>,
}

impl CompatSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.ids.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
    pub fn contains(&self, id: SymId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }
    pub fn insert(&mut self, id: SymId) {
        if let Err(i) = self.ids.binary_search(&id) {
            self.ids.insert(i, id);
        }
    }
    pub fn clear(&mut self) {
        self.ids.clear();
    }
    /// In-place intersection with `other`.
    pub fn intersect_with(&mut self, other: &CompatSet) {
        self.ids.retain(|id| other.contains(*id));
    }
    pub fn iter(&self) -> impl Iterator<Item = SymId> + '_ {
        self.ids.iter().cloned()
    }
}

/// A syntactic symmetry of the instance, with its propagation state.
pub(crate) struct Symmetry {
    id: SymId,
    /// Non-fixed literals, closed under negation. Every literal of `dom`
    /// has its image in `dom` as well.
    dom: Vec<Lit>,
    image: LMap<Lit>,   // Lit::UNDEF entries mean identity
    inverse: LMap<Lit>, // inverse permutation
    inverting: bool,

    /// Domain literals currently true, in trail order.
    notified: Vec<Lit>,
    /// Position of a literal inside `notified`, or -1.
    pos: LMap<i32>,
    /// Lowest index of `notified` whose image is not yet true; everything
    /// below it has a true image.
    next_idx: usize,
    /// Set when the current head candidate was already handed out for this
    /// assignment; cleared by any trail notification.
    tried_head: bool,

    /// Number of true choice literals of the domain whose image is not true.
    needed_for_active: u32,
    /// Broken at level 0; the generator cannot fire again in this search.
    perm_inactive: bool,

    /// Trail literals assigned by a symmetry clause this generator is not
    /// compatible with. Level-0 entries are never cancelled.
    breaked: Vec<Lit>,
}

impl Symmetry {
    /// Build a generator from parallel `from`/`to` arrays.
    ///
    /// The mapping is closed under negation, so generators may be given on
    /// positive literals only.
    pub(crate) fn new(id: SymId, from: &[Lit], to: &[Lit]) -> Self {
        assert_eq!(from.len(), to.len());
        let mut sym = Symmetry {
            id,
            dom: vec![],
            image: LMap::new(),
            inverse: LMap::new(),
            inverting: false,
            notified: vec![],
            pos: LMap::new(),
            next_idx: 0,
            tried_head: false,
            needed_for_active: 0,
            perm_inactive: false,
            breaked: vec![],
        };
        for (&f, &t) in from.iter().zip(to.iter()) {
            assert_ne!(f, t, "identity pairs are not a symmetry");
            sym.map_pair(f, t);
            sym.map_pair(!f, !t);
            if f == !t {
                sym.inverting = true;
            }
        }
        sym
    }

    fn map_pair(&mut self, f: Lit, t: Lit) {
        self.image.reserve(f, Lit::UNDEF);
        if self.image[f] == Lit::UNDEF {
            self.image[f] = t;
            self.inverse.reserve(t, Lit::UNDEF);
            self.inverse[t] = f;
            self.dom.push(f);
        } else {
            debug_assert_eq!(self.image[f], t, "generator maps {:?} twice", f);
        }
    }

    #[inline(always)]
    pub(crate) fn id(&self) -> SymId {
        self.id
    }

    pub(crate) fn is_inverting(&self) -> bool {
        self.inverting
    }

    /// Literals moved by the permutation (closed under negation).
    pub(crate) fn domain(&self) -> &[Lit] {
        &self.dom
    }

    /// π(l); identity on fixed literals.
    #[inline]
    pub(crate) fn image(&self, l: Lit) -> Lit {
        if self.image.has(l) && self.image[l] != Lit::UNDEF {
            self.image[l]
        } else {
            l
        }
    }

    /// π⁻¹(l); identity on fixed literals.
    #[inline]
    pub(crate) fn inverse(&self, l: Lit) -> Lit {
        if self.inverse.has(l) && self.inverse[l] != Lit::UNDEF {
            self.inverse[l]
        } else {
            l
        }
    }

    /// Does π map the clause onto itself (as a set of literals)?
    pub(crate) fn stabilize(&self, clause: &[Lit]) -> bool {
        clause.iter().all(|&l| {
            let img = self.image(l);
            img == l || clause.contains(&img)
        })
    }

    /// Consistent with the current trail: no choice literal of the domain
    /// has an unsatisfied image, and not permanently inactive.
    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        !self.perm_inactive && self.needed_for_active == 0
    }

    #[inline]
    pub(crate) fn is_permanently_inactive(&self) -> bool {
        self.perm_inactive
    }

    /// No trail literal the generator watches was assigned by an
    /// incompatible symmetry clause.
    #[inline]
    pub(crate) fn is_stab(&self) -> bool {
        self.breaked.is_empty()
    }

    /// Same, restricted to the level-0 prefix.
    pub(crate) fn is_stab_level_zero(&self, vars: &VarState) -> bool {
        self.breaked.iter().all(|&p| vars.level(p.var()) > 0)
    }

    /// Called when a domain literal `l` has just been assigned true.
    /// Replayed notifications (same literal, same assignment) are ignored.
    pub(crate) fn notify_enqueued(&mut self, l: Lit, vars: &VarState) {
        debug_assert_eq!(vars.value_lit(l), lbool::TRUE);
        self.pos.reserve(l, -1);
        if self.pos[l] >= 0 {
            return;
        }
        self.pos[l] = self.notified.len() as i32;
        self.notified.push(l);
        self.tried_head = false;

        let img = self.image(l);
        let inv = self.inverse(l);
        if vars.decision_level() == 0
            && (vars.value_lit(img) == lbool::FALSE || vars.value_lit(inv) == lbool::FALSE)
        {
            // l and the falsified partner are both fixed at level 0
            self.perm_inactive = true;
        }
        if vars.is_choice(l.var()) && vars.value_lit(img) != lbool::TRUE {
            self.needed_for_active += 1;
        }
        // inv's image is l, which just became true
        if inv != l && vars.value_lit(inv) == lbool::TRUE && vars.is_choice(inv.var()) {
            debug_assert!(self.needed_for_active > 0);
            self.needed_for_active -= 1;
        }
    }

    /// Called when a domain literal `l` is about to leave the trail.
    /// The assignment of `l` must still be visible.
    pub(crate) fn notify_backtrack(&mut self, l: Lit, vars: &VarState) {
        debug_assert_eq!(vars.value_lit(l), lbool::TRUE);
        self.pos.reserve(l, -1);
        if self.pos[l] < 0 {
            return;
        }
        debug_assert_eq!(self.notified.last(), Some(&l));
        self.notified.pop();
        self.pos[l] = -1;
        if self.next_idx > self.notified.len() {
            self.next_idx = self.notified.len();
        }
        self.tried_head = false;

        let img = self.image(l);
        if vars.is_choice(l.var()) && vars.value_lit(img) != lbool::TRUE {
            debug_assert!(self.needed_for_active > 0);
            self.needed_for_active -= 1;
        }
        let inv = self.inverse(l);
        if inv != l && vars.value_lit(inv) == lbool::TRUE {
            if vars.is_choice(inv.var()) {
                self.needed_for_active += 1;
            }
            // inv loses its image; rewind the scan below it
            self.pos.reserve(inv, -1);
            let p = self.pos[inv];
            if p >= 0 && (p as usize) < self.next_idx {
                self.next_idx = p as usize;
            }
        }
    }

    /// A literal `p` was assigned with an incompatible symmetry clause as
    /// reason, touching a literal this generator moves.
    pub(crate) fn notify_reason_of_breaked(&mut self, p: Lit) {
        if !self.breaked.contains(&p) {
            self.breaked.push(p);
        }
    }

    /// Inverse of [`Symmetry::notify_reason_of_breaked`], fired on
    /// backtrack. Level-0 entries stay.
    pub(crate) fn cancel_reason_of_breaked(&mut self, p: Lit, vars: &VarState) {
        if vars.level(p.var()) == 0 {
            return;
        }
        if let Some(i) = self.breaked.iter().position(|&q| q == p) {
            self.breaked.swap_remove(i);
        }
    }

    /// Next trail literal whose symmetrical counterpart can be derived, if
    /// any.
    ///
    /// This is the lowest notified literal whose image is not yet true;
    /// every notified literal assigned before it has a true image, which is
    /// what makes the symmetrical reason clause asserting. The scan never
    /// skips past an unsatisfied image, and a given head is handed out at
    /// most once per assignment.
    pub(crate) fn next_to_propagate(
        &mut self,
        vars: &VarState,
        symmetry_units: &IntSet<Var>,
    ) -> Option<Lit> {
        while self.next_idx < self.notified.len() {
            let l = self.notified[self.next_idx];
            if vars.value_lit(self.image(l)) == lbool::TRUE {
                self.next_idx += 1;
                self.tried_head = false;
                continue;
            }
            if self.tried_head {
                return None;
            }
            let v = l.var();
            if vars.level(v) == 0 {
                // units owed to symmetry cannot justify the binary shortcut
                if symmetry_units.has(v) {
                    return None;
                }
            } else if !vars.has_reason(v) {
                return None;
            }
            self.tried_head = true;
            return Some(l);
        }
        None
    }

    /// Apply π to a reason clause and order the result so that slot 0 holds
    /// the unassigned (or asserting) literal and slot 1 the highest level
    /// among the rest.
    pub(crate) fn sorted_symmetrical_clause(
        &self,
        reason: &[Lit],
        vars: &VarState,
        out: &mut Vec<Lit>,
    ) {
        debug_assert!(reason.len() >= 2);
        out.clear();
        out.extend(reason.iter().map(|&l| self.image(l)));

        let mut best = 0;
        for i in 1..out.len() {
            debug_assert!(vars.value_lit(out[i]) != lbool::TRUE);
            let undef_i = vars.value_lit(out[i]) == lbool::UNDEF;
            let undef_b = vars.value_lit(out[best]) == lbool::UNDEF;
            if !undef_b && (undef_i || vars.level(out[best].var()) < vars.level(out[i].var())) {
                best = i;
            }
        }
        out.swap(0, best);
        if out.len() > 2 {
            let mut max_i = 1;
            for i in 2..out.len() {
                if vars.level(out[i].var()) > vars.level(out[max_i].var()) {
                    max_i = i;
                }
            }
            out.swap(1, max_i);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn lit(x: i32) -> Lit {
        Lit::new(Var::from_idx((x.abs() - 1) as u32), x > 0)
    }

    #[test]
    fn test_compat_set_ops() {
        let mut a = CompatSet::new();
        a.insert(4);
        a.insert(0);
        a.insert(2);
        a.insert(4);
        assert_eq!(a.len(), 3);
        let mut b = CompatSet::new();
        b.insert(2);
        b.insert(4);
        b.insert(7);
        a.intersect_with(&b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![2, 4]);
        a.intersect_with(&CompatSet::new());
        assert!(a.is_empty());
    }

    #[test]
    fn test_image_inverse_roundtrip() {
        // swap of variables 1 and 2, given on positive literals only
        let sym = Symmetry::new(0, &[lit(1), lit(2)], &[lit(2), lit(1)]);
        for &l in &[lit(1), lit(-1), lit(2), lit(-2), lit(3), lit(-3)] {
            assert_eq!(sym.inverse(sym.image(l)), l);
            assert_eq!(sym.image(sym.inverse(l)), l);
            // negation commutes with the permutation
            assert_eq!(sym.image(!l), !sym.image(l));
        }
        assert_eq!(sym.image(lit(1)), lit(2));
        assert_eq!(sym.image(lit(-2)), lit(-1));
        assert_eq!(sym.image(lit(3)), lit(3));
        assert!(!sym.is_inverting());
    }

    #[test]
    fn test_inverting_detected() {
        let sym = Symmetry::new(0, &[lit(1)], &[lit(-1)]);
        assert!(sym.is_inverting());
        assert_eq!(sym.image(lit(-1)), lit(1));
    }

    #[test]
    fn test_stabilize() {
        let sym = Symmetry::new(0, &[lit(1), lit(2)], &[lit(2), lit(1)]);
        assert!(sym.stabilize(&[lit(1), lit(2), lit(3)]));
        assert!(sym.stabilize(&[lit(-1), lit(-2)]));
        assert!(!sym.stabilize(&[lit(1), lit(3)]));
        assert!(sym.stabilize(&[lit(3), lit(4)]));
    }
}
