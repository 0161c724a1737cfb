/*****************************************************************************************[core.rs]
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

use {
    crate::callbacks::{Callbacks, ProgressStatus},
    crate::clause::{
        self, lbool, CRef, ClauseAllocator, ClauseRef, DeletePred, LMap, LSet, Lit, OccLists,
        OccListsData, VMap, Var,
    },
    crate::intmap::{Comparator, Heap, HeapData, IntSet},
    crate::interface::SolverInterface,
    crate::order::{InjectKind, OrderMode, SymmetryOrder, ValueMode},
    crate::symmetry::{CompatSet, SymId, Symmetry},
    std::{
        cmp, f64, fmt, io, mem,
        sync::atomic::{AtomicBool, Ordering},
    },
};

/// The main solver structure
///
/// A `Solver` object contains the whole state of the SAT solver, including
/// the clause allocator, the trail, the registered symmetries and the
/// statistics.
///
/// It is parametrized by `Callbacks`
pub struct Solver<Cb: Callbacks> {
    // Extra results: (read-only member variable)
    /// If problem is satisfiable, this vector contains the model (if any).
    model: Vec<lbool>,
    /// If problem is unsatisfiable (possibly under assumptions),
    /// this vector represent the final conflict clause expressed in the assumptions.
    conflict: LSet,

    cb: Cb, // the callbacks
    asynch_interrupt: AtomicBool,

    /// List of problem clauses.
    clauses: Vec<CRef>,
    /// List of learnt clauses.
    learnts: Vec<CRef>,

    v: SolverV,
}

/// The current assignments.
pub(crate) struct VarState {
    /// A heuristic measurement of the activity of a variable.
    activity: VMap<f64>,
    /// Current assignment for each variable.
    ass: VMap<lbool>,
    /// Stores reason and level for each variable.
    vardata: VMap<VarData>,
    /// Amount to bump next variable with.
    var_inc: f64,
    var_decay: f64,

    /// Assignment stack; stores all assigments made in the order they were made.
    trail: Vec<Lit>,
    /// Separator indices for different decision levels in `trail`.
    trail_lim: Vec<i32>,
}

struct SolverV {
    vars: VarState,

    learntsize_adjust_start_confl: i32,
    learntsize_adjust_inc: f64,
    max_learnts: f64,
    learntsize_adjust_confl: f64,
    learntsize_adjust_cnt: i32,

    remove_satisfied: bool,

    // Statistics: (read-only member variable)
    solves: u64,
    starts: u64,
    decisions: u64,
    rnd_decisions: u64,
    propagations: u64,
    conflicts: u64,
    sympropagations: u64,
    symconflicts: u64,
    dec_vars: u64,
    max_literals: u64,
    tot_literals: u64,

    num_clauses: u64,
    num_learnts: u64,
    clauses_literals: u64,
    learnts_literals: u64,

    // Mode of operation:
    clause_decay: f64,
    random_var_freq: f64,
    random_seed: f64,
    luby_restart: bool,
    /// Controls conflict clause minimization (0=none, 1=basic, 2=deep).
    ccmin_mode: i32,
    /// Controls the level of phase saving (0=none, 1=limited, 2=full).
    phase_saving: i32,
    /// Use random polarities for branching heuristics.
    rnd_pol: bool,
    /// Initialize variable activities with a small random value.
    rnd_init_act: bool,
    /// The fraction of wasted memory allowed before a garbage collection is triggered.
    garbage_frac: f64,
    /// Minimum number to set the learnts limit to.
    min_learnts_lim: i32,

    /// The initial restart limit. (default 100)
    restart_first: i32,
    /// The factor with which the restart limit is multiplied in each restart. (default 2.0)
    restart_inc: f64,
    /// The intitial limit for learnt clauses is a factor of the original clauses. (default 1 / 3)
    learntsize_factor: f64,
    /// The limit for learnt clauses is multiplied with this factor each restart. (default 1.1)
    learntsize_inc: f64,

    /// Keep clauses generated by symmetrical propagation.
    add_propagation_clauses: bool,
    /// Keep clauses generated by symmetrical conflicts.
    add_conflict_clauses: bool,
    /// Deprioritize variables moved by inverting symmetries.
    inverting_opt: bool,
    /// Attempt propagation for weakly inactive symmetries.
    inactive_opt: bool,
    /// Query the order hook for ESBP clauses after each propagated literal.
    esbp_end: bool,

    /// The preferred polarity of each variable.
    polarity: VMap<bool>,
    /// The users preferred polarity of each variable.
    user_pol: VMap<lbool>,
    /// Declares if a variable is eligible for selection in the decision heuristic.
    decision: VMap<bool>,
    /// `watches[lit]` is a list of constraints watching 'lit' (will go there if literal becomes true).
    watches_data: OccListsData<Lit, Watcher>,
    /// A priority queue of variables ordered with respect to the variable activity.
    order_heap_data: HeapData<Var>,
    /// If `false`, the constraints are already unsatisfiable. No part of the solver state may be used!
    ok: bool,
    /// Amount to bump next clause with.
    cla_inc: f64,
    /// Head of queue (as index into the trail).
    qhead: i32,
    /// Number of top-level assignments since last execution of 'simplify()'.
    simp_db_assigns: i32,
    /// Remaining number of propagations that must be made before next execution of 'simplify()'.
    simp_db_props: i64,
    /// Set by `search()`.
    progress_estimate: f64,

    /// Next variable to be created.
    next_var: Var,
    ca: ClauseAllocator,

    free_vars: Vec<Var>,
    released_vars: Vec<Var>,

    /// Current set of assumptions provided to solve by the user.
    assumptions: Vec<Lit>,

    /// The registered symmetry generators.
    symmetries: Vec<Symmetry>,
    /// `watcher_syms[l]` lists the generators that move `l`; they are told
    /// whenever `l` enters or leaves the trail.
    watcher_syms: LMap<Vec<SymId>>,
    /// Level-0 variables whose assignment is owed to a symmetry.
    symmetry_units: IntSet<Var>,
    /// Number of registered inverting generators.
    inverting_syms: u64,
    /// Optional external symmetry-order engine.
    order: Option<Box<dyn SymmetryOrder>>,

    // Temporaries (to reduce allocation overhead). Each variable is prefixed by the method in which it is
    // used, except `seen` wich is used in several places.
    seen: VMap<Seen>,
    minimize_stack: Vec<Lit>,
    analyze_toclear: Vec<Lit>,
    implic_tmp: Vec<Lit>,

    // Resource contraints:
    conflict_budget: i64,
    propagation_budget: i64,
}

///
/// Print the model as DIMACS
pub struct SolverPrintDimacs<'a, Cb: Callbacks + 'a> {
    s: &'a Solver<Cb>,
}

mod model_dimacs {
    use super::*;

    impl<'a, Cb: Callbacks> fmt::Display for SolverPrintDimacs<'a, Cb> {
        fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
            write!(out, "v ")?;
            for (i, &val) in self.s.model.iter().enumerate() {
                if val == lbool::TRUE {
                    write!(out, "{} ", i + 1)?
                } else if val == lbool::FALSE {
                    write!(out, "-{} ", i + 1)?
                }
            }
            writeln!(out, "0")
        }
    }
}

// public API
impl<Cb: Callbacks> SolverInterface for Solver<Cb> {
    fn new_var(&mut self, upol: lbool, dvar: bool) -> Var {
        self.v.new_var(upol, dvar)
    }

    fn new_var_default(&mut self) -> Var {
        self.new_var(lbool::UNDEF, true)
    }

    fn var_of_int(&mut self, v_idx: u32) -> Var {
        while v_idx >= self.num_vars() {
            self.new_var_default();
        }
        let var = Var::from_idx(v_idx);
        debug_assert_eq!(var.idx(), v_idx);
        var
    }

    // in the API, we can only add clauses at level 0
    fn add_clause_reuse(&mut self, clause: &mut Vec<Lit>) -> bool {
        debug!("add toplevel clause {:?}", clause);
        debug_assert_eq!(
            self.v.decision_level(),
            0,
            "add clause at non-zero decision level"
        );
        clause.sort_unstable();
        self.add_clause_(clause)
    }

    fn add_symmetry(&mut self, from: &[Lit], to: &[Lit]) {
        debug!("add symmetry {:?} -> {:?}", from, to);
        debug_assert_eq!(self.v.decision_level(), 0);
        assert_eq!(from.len(), to.len());
        let id = self.v.symmetries.len() as SymId;
        let sym = Symmetry::new(id, from, to);
        if sym.is_inverting() {
            self.v.inverting_syms += 1;
        }
        for i in 0..sym.domain().len() {
            let l = sym.domain()[i];
            self.v.watcher_syms.reserve_default(l);
            self.v.watcher_syms[l].push(id);
            if self.v.inverting_opt && sym.image(l) == !l && l.sign() {
                let amount = -self.v.vars.var_inc;
                self.v
                    .vars
                    .var_bump_activity_by(&mut self.v.order_heap_data, l.var(), amount);
            }
        }
        debug_assert!(
            self.check_symmetry(&sym),
            "generator does not map the instance onto itself"
        );
        self.v.symmetries.push(sym);
    }

    fn simplify(&mut self) -> bool {
        self.simplify_internal()
    }

    fn solve_limited(&mut self, assumps: &[Lit]) -> lbool {
        self.asynch_interrupt.store(false, Ordering::SeqCst);
        self.v.assumptions.clear();
        self.v.assumptions.extend_from_slice(assumps);
        self.solve_internal()
    }

    fn value_var(&self, v: Var) -> lbool {
        self.model
            .get(v.idx() as usize)
            .map_or(lbool::UNDEF, |&v| v)
    }
    fn value_lit(&self, v: Lit) -> lbool {
        self.value_var(v.var()) ^ !v.sign()
    }
    fn get_model(&self) -> &[lbool] {
        &self.model
    }
    fn is_ok(&self) -> bool {
        self.v.ok
    }

    fn num_vars(&self) -> u32 {
        self.v.num_vars()
    }
    fn num_clauses(&self) -> u64 {
        self.v.num_clauses
    }
    fn num_conflicts(&self) -> u64 {
        self.v.conflicts
    }
    fn num_propagations(&self) -> u64 {
        self.v.propagations
    }
    fn num_decisions(&self) -> u64 {
        self.v.decisions
    }
    fn num_restarts(&self) -> u64 {
        self.v.starts
    }
    fn num_sym_propagations(&self) -> u64 {
        self.v.sympropagations
    }
    fn num_sym_conflicts(&self) -> u64 {
        self.v.symconflicts
    }

    fn value_lvl_0(&self, lit: Lit) -> lbool {
        let mut res = self.v.value_lit(lit);
        if self.v.level(lit.var()) != 0 {
            res = lbool::UNDEF;
        }
        res
    }

    fn print_stats(&self) {
        println!("c restarts              : {}", self.v.starts);
        println!("c conflicts             : {:<12}", self.v.conflicts);
        println!("c symmetry conflicts    : {:<12}", self.v.symconflicts);
        println!(
            "c decisions             : {:<12}   ({:4.2} % random)",
            self.v.decisions,
            self.v.rnd_decisions as f32 * 100.0 / self.v.decisions as f32
        );
        println!("c propagations          : {:<12}", self.v.propagations);
        println!("c symmetry propagations : {:<12}", self.v.sympropagations);
        println!(
            "c conflict literals     : {:<12}   ({:4.2} % deleted)",
            self.v.tot_literals,
            (self.v.max_literals - self.v.tot_literals) as f64 * 100.0 / self.v.max_literals as f64
        );
        println!("c inverting symmetries  : {}", self.v.inverting_syms);
    }

    fn unsat_core(&self) -> &[Lit] {
        self.conflict.as_slice()
    }

    fn unsat_core_contains_lit(&self, lit: Lit) -> bool {
        self.conflict.has(lit)
    }

    fn unsat_core_contains_var(&self, v: Var) -> bool {
        let lit = Lit::new(v, true);
        self.unsat_core_contains_lit(lit) || self.unsat_core_contains_lit(!lit)
    }

    fn proved_at_lvl_0(&self) -> &[Lit] {
        self.v.vars.proved_at_lvl_0()
    }
}

impl<Cb: Callbacks + Default> Default for Solver<Cb> {
    fn default() -> Self {
        Solver::new(SolverOpts::default(), Default::default())
    }
}

// main algorithm
impl<Cb: Callbacks> Solver<Cb> {
    /// Create a new solver with the given options and callbacks.
    pub fn new(opts: SolverOpts, cb: Cb) -> Self {
        assert!(opts.check());
        Self {
            model: vec![],
            conflict: LSet::new(),
            cb,
            clauses: vec![],
            learnts: vec![],
            asynch_interrupt: AtomicBool::new(false),
            v: SolverV::new(&opts),
        }
    }

    /// Plug in an external symmetry-order engine.
    pub fn set_order(&mut self, order: Box<dyn SymmetryOrder>) {
        self.v.order = Some(order);
    }

    /// Release a variable; it will not be used again until `simplify` has
    /// recycled it.
    pub fn release_var(&mut self, l: Lit) {
        if self.v.value_lit(l) == lbool::UNDEF {
            let mut c = vec![l];
            self.add_clause_(&mut c);
            self.v.released_vars.push(l.var());
        }
    }

    fn simplify_internal(&mut self) -> bool {
        debug_assert_eq!(self.v.decision_level(), 0);

        if !self.v.ok || self.v.propagate(&mut self.learnts).is_some() {
            self.v.ok = false;
            return false;
        }

        if self.v.num_assigns() as i32 == self.v.simp_db_assigns || self.v.simp_db_props > 0 {
            return true;
        }

        self.cb.on_simplify();
        self.remove_satisfied(ClauseSetSelect::Learnt); // Remove satisfied learnt clauses
        if self.v.remove_satisfied {
            self.remove_satisfied(ClauseSetSelect::Original); // remove satisfied normal clauses

            // Remove all released variables from the trail:
            for i in 0..self.v.released_vars.len() {
                let v = self.v.released_vars[i];
                debug_assert_eq!(self.v.seen[v], Seen::UNDEF);
                self.v.seen[v] = Seen::SOURCE;
            }
            let mut j = 0;
            for i in 0..self.v.vars.trail.len() {
                let lit = self.v.vars.trail[i];
                if self.v.seen[lit.var()] == Seen::UNDEF {
                    self.v.vars.trail[j] = lit;
                    j += 1;
                }
            }
            self.v.vars.trail.truncate(j);
            self.v.qhead = j as i32;
            for i in 0..self.v.released_vars.len() {
                let v = self.v.released_vars[i];
                self.v.seen[v] = Seen::UNDEF;
            }

            // Released variables are now ready to be reused:
            let mut released = mem::replace(&mut self.v.released_vars, vec![]);
            self.v.free_vars.append(&mut released);
        }
        self.check_garbage();
        self.v.rebuild_order_heap();

        self.v.simp_db_assigns = self.v.num_assigns() as i32;
        // (shouldn't depend on stats really, but it will do for now)
        self.v.simp_db_props = (self.v.clauses_literals + self.v.learnts_literals) as i64;

        true
    }

    /// Search for a model the specified number of conflicts.
    ///
    /// Use negative value for `nof_conflicts` indicate infinity.
    ///
    /// # Output:
    ///
    /// - `lbool::TRUE` if a partial assigment that is consistent with respect to the clauseset is found. If
    ///    all variables are decision variables, this means that the clause set is satisfiable.
    /// - `lbool::FALSE` if the clause set is unsatisfiable.
    /// - 'lbool::UNDEF` if the bound on number of conflicts is reached.
    fn search(&mut self, nof_conflicts: i32, tmp_learnt: &mut Vec<Lit>) -> lbool {
        debug_assert!(self.v.ok);
        let mut conflict_c = 0;
        self.v.starts += 1;

        loop {
            // boolean propagation to fixpoint, then symmetry propagation
            let confl = self.v.propagate(&mut self.learnts);

            if let Some(confl) = confl {
                // conflict analysis
                self.v.conflicts += 1;
                conflict_c += 1;
                if self.v.decision_level() == 0 {
                    return lbool::FALSE;
                }

                let learnt = self.v.analyze(confl, &self.learnts, tmp_learnt);
                self.add_learnt_and_backtrack(learnt);

                self.v.vars.var_decay_activity();
                self.v.cla_decay_activity();

                self.v.learntsize_adjust_cnt -= 1;
                if self.v.learntsize_adjust_cnt == 0 {
                    self.v.learntsize_adjust_confl *= self.v.learntsize_adjust_inc;
                    self.v.learntsize_adjust_cnt = self.v.learntsize_adjust_confl as i32;
                    self.v.max_learnts *= self.v.learntsize_inc;

                    let trail_lim_head = self
                        .v
                        .vars
                        .trail_lim
                        .first()
                        .cloned()
                        .unwrap_or(self.v.vars.trail.len() as i32);
                    let v = &self.v;
                    self.cb.on_progress(|| ProgressStatus {
                        conflicts: v.conflicts as i32,
                        dec_vars: v.dec_vars as i32 - trail_lim_head,
                        n_clauses: v.num_clauses,
                        n_clause_lits: v.clauses_literals as i32,
                        max_learnt: v.max_learnts as i32,
                        n_learnt: v.num_learnts,
                        n_learnt_lits: v.learnts_literals as f64 / v.num_learnts as f64,
                        progress_estimate: v.progress_estimate() * 100.0,
                    });
                }
            } else {
                // no conflict
                if (nof_conflicts >= 0 && conflict_c >= nof_conflicts) || !self.within_budget() {
                    // Reached bound on number of conflicts:
                    self.v.progress_estimate = self.v.progress_estimate();
                    self.v.cancel_until(0);
                    return lbool::UNDEF;
                }

                // Simplify the set of problem clauses:
                if self.v.decision_level() == 0 && !self.simplify_internal() {
                    return lbool::FALSE;
                }

                if self.learnts.len() as f64 - self.v.num_assigns() as f64 >= self.v.max_learnts {
                    // Reduce the set of learnt clauses:
                    self.reduce_db();
                }

                // select the next decision (using assumptions, or variable heap)
                let mut next = Lit::UNDEF;
                while (self.v.decision_level() as usize) < self.v.assumptions.len() {
                    // Perform user provided assumption:
                    let p = self.v.assumptions[self.v.decision_level() as usize];
                    if self.v.value_lit(p) == lbool::TRUE {
                        // Dummy decision level, since `p` is true already:
                        self.v.vars.new_decision_level();
                    } else if self.v.value_lit(p) == lbool::FALSE {
                        let mut conflict = mem::replace(&mut self.conflict, LSet::new());
                        self.v.analyze_final(!p, &mut conflict);
                        self.conflict = conflict;
                        return lbool::FALSE;
                    } else {
                        next = p;
                        break;
                    }
                }

                if next == Lit::UNDEF {
                    // new variable decision:
                    self.v.decisions += 1;
                    next = self.v.pick_branch_lit();

                    if next == Lit::UNDEF {
                        // Model found:
                        return lbool::TRUE;
                    }
                }

                // Increase decision level and enqueue `next`
                // with no justification since it's a decision
                trace!("pick-next {:?}", next);
                self.v.vars.new_decision_level();
                self.v.unchecked_enqueue(next, CRef::UNDEF);
            }
        }
    }

    /// Add a learnt clause and backtrack/propagate as necessary
    fn add_learnt_and_backtrack(&mut self, learnt: LearntClause) {
        let kind = if learnt.symmetry {
            clause::Kind::Symmetry
        } else {
            clause::Kind::Learnt
        };
        self.cb.on_new_clause(learnt.clause, kind);
        self.v.cancel_until(learnt.backtrack_lvl as u32);

        if learnt.clause.len() == 1 {
            // directly propagate the unit clause at level 0
            debug_assert_eq!(self.v.decision_level(), 0);
            if learnt.symmetry {
                self.v.symmetry_units.insert(learnt.clause[0].var());
            }
            self.v.unchecked_enqueue(learnt.clause[0], CRef::UNDEF);
        } else {
            // propagate the lit, justified by `cr`
            let cr = if learnt.symmetry {
                self.v.ca.alloc_with_symmetry(
                    learnt.clause,
                    learnt.first_symmetry,
                    true,
                    Some(learnt.compat),
                )
            } else {
                self.v.ca.alloc_with_learnt(learnt.clause, true)
            };
            self.learnts.push(cr);
            self.v.attach_clause(cr);
            self.v.cla_bump_activity(&self.learnts, cr);
            self.v.unchecked_enqueue(learnt.clause[0], cr);
        }
    }

    /// Main solve method (assumptions given in `self.v.assumptions`).
    fn solve_internal(&mut self) -> lbool {
        debug_assert_eq!(self.v.decision_level(), 0);
        self.model.clear();
        self.conflict.clear();
        if !self.v.ok {
            return lbool::FALSE;
        }

        self.v.solves += 1;
        let mut tmp_learnt: Vec<Lit> = vec![];

        // let the order engine and late-registered symmetries observe the
        // level-0 trail, then take the units the engine offers
        if let Some(order) = self.v.order.as_mut() {
            order.enable(OrderMode::Auto, ValueMode::TrueLessFalse);
        }
        self.v.notify_cnf_units();
        self.v.inject_order_units();

        self.v.max_learnts = self.num_clauses() as f64 * self.v.learntsize_factor;
        if self.v.max_learnts < self.v.min_learnts_lim as f64 {
            self.v.max_learnts = self.v.min_learnts_lim as f64;
        }

        self.v.learntsize_adjust_confl = self.v.learntsize_adjust_start_confl as f64;
        self.v.learntsize_adjust_cnt = self.v.learntsize_adjust_confl as i32;
        let mut status;

        info!("search.start");
        self.cb.on_start();

        // Search:
        let mut curr_restarts: i32 = 0;
        loop {
            let rest_base = if self.v.luby_restart {
                utils::luby(self.v.restart_inc, curr_restarts)
            } else {
                f64::powi(self.v.restart_inc, curr_restarts)
            };
            let nof_clauses = (rest_base * self.v.restart_first as f64) as i32;
            status = self.search(nof_clauses, &mut tmp_learnt);
            if !self.within_budget() {
                break;
            }

            if status != lbool::UNDEF {
                break;
            } else {
                info!("search.restart({})", curr_restarts);
                curr_restarts += 1;
                self.cb.on_restart();
            }
        }

        self.cb.on_result(status);

        if status == lbool::TRUE {
            // Extend & copy model:
            let num_vars = self.num_vars();
            self.model.resize(num_vars as usize, lbool::UNDEF);
            for i in 0..num_vars {
                self.model[i as usize] = self.v.value(Var::from_idx(i));
            }
        } else if status == lbool::FALSE && self.conflict.len() == 0 {
            // NOTE: we may return `false` without an empty conflict in case we had assumptions. In
            // this case `self.conflict` contains the unsat-core but adding new clauses might
            // succeed in the absence of these assumptions.
            self.v.ok = false;
        }

        self.v.cancel_until(0);
        debug!("res: {:?}", status);
        status
    }

    /// Remove half of the learnt clauses, minus the clauses locked by the current assignment. Locked
    /// clauses are clauses that are reason to some assignment. Binary clauses are never removed.
    fn reduce_db(&mut self) {
        let extra_lim = self.v.cla_inc / self.learnts.len() as f64; // Remove any clause below this activity

        debug!("reduce_db.start");

        {
            let ca = &self.v.ca;
            self.learnts.sort_unstable_by(|&x, &y| {
                let x = ca.get_ref(x);
                let y = ca.get_ref(y);
                debug_assert!(x.learnt());
                debug_assert!(y.learnt());
                Ord::cmp(&(x.size() <= 2), &(y.size() <= 2)).then(
                    PartialOrd::partial_cmp(&x.activity(), &y.activity()).expect("NaN activity"),
                )
            });
        }
        // Don't delete binary or locked clauses. From the rest, delete clauses from the first half
        // and clauses with activity smaller than `extra_lim`:
        let mut j = 0;
        for i in 0..self.learnts.len() {
            let cr = self.learnts[i];
            let cond = {
                let c = self.v.ca.get_ref(cr);
                c.size() > 2
                    && !self.v.locked(c)
                    && (i < self.learnts.len() / 2 || (c.activity() as f64) < extra_lim)
            };
            if cond {
                self.v.remove_clause(cr);
                self.cb.on_delete_clause(self.v.ca.get_ref(cr).lits());
            } else {
                self.learnts[j] = cr;
                j += 1;
            }
        }

        let _deleted = self.learnts.len() - j;
        self.learnts.truncate(j);

        debug!("reduce_db.done (deleted {})", _deleted);

        self.check_garbage();
    }

    /// Shrink the given set to contain only non-satisfied clauses.
    fn remove_satisfied(&mut self, which: ClauseSetSelect) {
        debug_assert_eq!(self.v.decision_level(), 0);
        let cs: &mut Vec<CRef> = match which {
            ClauseSetSelect::Learnt => &mut self.learnts,
            ClauseSetSelect::Original => &mut self.clauses,
        };
        let self_v = &mut self.v;
        cs.retain(|&cr| {
            let satisfied = self_v.satisfied(self_v.ca.get_ref(cr));
            if satisfied {
                self_v.remove_clause(cr);
            } else {
                let amount_shaved = {
                    let mut c = self_v.ca.get_mut(cr);
                    // Trim clause (but keep the 2 first lits as they are watching):
                    debug_assert_eq!(self_v.vars.value_lit(c[0]), lbool::UNDEF);
                    debug_assert_eq!(self_v.vars.value_lit(c[1]), lbool::UNDEF);
                    let mut k = 2;
                    let orig_size = c.size();
                    let mut end = c.size();
                    while k < end {
                        if self_v.vars.value_lit(c[k]) == lbool::FALSE {
                            // this lit is false at level 0, remove it from `c`
                            debug_assert_eq!(self_v.vars.level(c[k].var()), 0);
                            end -= 1;
                            c[k] = c[end];
                        } else {
                            k += 1;
                        }
                    }
                    c.shrink(end);
                    orig_size - end
                };
                self_v.ca.free_amount(amount_shaved as usize);
            }
            !satisfied
        });
    }

    /// Garbage collect the clause allocator by moving alive clauses into
    /// another allocator.
    fn garbage_collect(&mut self) {
        // Initialize the next region to a size corresponding to the estimated utilization degree. This
        // is not precise but should avoid some unnecessary reallocations for the new region:
        let mut to = ClauseAllocator::with_start_cap(self.v.ca.len() - self.v.ca.wasted());

        self.v
            .reloc_all(&mut self.learnts, &mut self.clauses, &mut to);

        self.cb.on_gc(
            (self.v.ca.len() * ClauseAllocator::UNIT_SIZE as usize) as usize,
            (to.len() * ClauseAllocator::UNIT_SIZE as usize) as usize,
        );
        self.v.ca = to;
    }

    /// Check whether the space wasted by dead clauses in the clause allocator exceeds
    /// the threshold
    fn check_garbage(&mut self) {
        if self.v.ca.wasted() as f64 > self.v.ca.len() as f64 * self.v.garbage_frac {
            self.garbage_collect();
        }
    }

    /// Temporary access to the callbacks
    pub fn cb_mut(&mut self) -> &mut Cb {
        &mut self.cb
    }

    /// Temporary access to the callbacks
    pub fn cb(&self) -> &Cb {
        &self.cb
    }

    pub fn dimacs_model(&self) -> SolverPrintDimacs<Cb> {
        SolverPrintDimacs { s: self }
    }

    /// Interrupt search asynchronously
    pub fn interrupt_async(&self) {
        self.asynch_interrupt.store(true, Ordering::Relaxed);
    }

    /// Limit the number of conflicts of the next `solve_limited` call
    /// (negative means no limit).
    pub fn set_conflict_budget(&mut self, x: i64) {
        self.v.conflict_budget = if x < 0 { -1 } else { self.v.conflicts as i64 + x };
    }

    /// Limit the number of propagations of the next `solve_limited` call
    /// (negative means no limit).
    pub fn set_propagation_budget(&mut self, x: i64) {
        self.v.propagation_budget = if x < 0 {
            -1
        } else {
            self.v.propagations as i64 + x
        };
    }

    /// Remove any budget.
    pub fn budget_off(&mut self) {
        self.v.conflict_budget = -1;
        self.v.propagation_budget = -1;
    }

    fn has_been_interrupted(&self) -> bool {
        self.asynch_interrupt.load(Ordering::Relaxed)
    }

    fn within_budget(&self) -> bool {
        !self.has_been_interrupted()
            && (self.v.conflict_budget < 0 || self.v.conflicts < self.v.conflict_budget as u64)
            && (self.v.propagation_budget < 0
                || self.v.propagations < self.v.propagation_budget as u64)
            && !self.cb.stop()
    }

    /// Add clause.
    ///
    /// Precondition: `clause` is sorted for some ordering on `Lit`
    fn add_clause_(&mut self, clause: &mut Vec<Lit>) -> bool {
        if !self.v.ok {
            return false;
        }

        let mut last_lit = Lit::UNDEF;
        let mut j = 0;
        // remove duplicates, true literals, etc.
        for i in 0..clause.len() {
            let lit_i = clause[i];
            let value = self.v.value_lit(lit_i);
            let lvl = self.v.level_lit(lit_i);
            if (value == lbool::TRUE && lvl == 0) || lit_i == !last_lit {
                return true; // tauto or satisfied already at level 0
            } else if !(value == lbool::FALSE && lvl == 0) && lit_i != last_lit {
                // not a duplicate
                last_lit = lit_i;
                clause[j] = lit_i;
                j += 1;
            }
        }

        clause.truncate(j);
        if clause.len() == 0 {
            self.v.ok = false;
            return false;
        } else if clause.len() == 1 {
            self.v.unchecked_enqueue(clause[0], CRef::UNDEF);
        } else {
            let cr = self.v.ca.alloc_with_learnt(&clause, false);
            self.clauses.push(cr);
            self.v.attach_clause(cr);
        }

        true
    }

    /// Does `sym` map every original clause onto an original clause?
    fn check_symmetry(&self, sym: &Symmetry) -> bool {
        for &cr in &self.clauses {
            let c = self.v.ca.get_ref(cr);
            let mut img: Vec<Lit> = c.lits().iter().map(|&l| sym.image(l)).collect();
            img.sort_unstable();
            let found = self.clauses.iter().any(|&cr2| {
                let c2 = self.v.ca.get_ref(cr2);
                if c2.size() != c.size() {
                    return false;
                }
                let mut lits2: Vec<Lit> = c2.lits().to_vec();
                lits2.sort_unstable();
                lits2 == img
            });
            if !found {
                return false;
            }
        }
        true
    }

    /// Write the current set of clauses (plus the given assumptions as unit
    /// clauses) in DIMACS format. An already-unsatisfiable solver is
    /// rendered as the smallest unsatisfiable instance.
    pub fn write_dimacs<W: io::Write>(&self, out: &mut W, assumps: &[Lit]) -> io::Result<()> {
        debug_assert_eq!(self.v.decision_level(), 0);
        if !self.v.ok {
            return write!(out, "p cnf 1 2\n1 0\n-1 0\n");
        }

        let mut map: VMap<i32> = VMap::new();
        let mut max: i32 = 0;
        let map_var = |v: Var, map: &mut VMap<i32>, max: &mut i32| -> i32 {
            map.reserve(v, -1);
            if map[v] == -1 {
                map[v] = *max;
                *max += 1;
            }
            map[v]
        };

        let mut cnt = 0;
        for &cr in &self.clauses {
            if !self.v.satisfied(self.v.ca.get_ref(cr)) {
                cnt += 1;
                for &l in self.v.ca.get_ref(cr).lits() {
                    if self.v.value_lit(l) != lbool::FALSE {
                        map_var(l.var(), &mut map, &mut max);
                    }
                }
            }
        }
        cnt += assumps.len();

        writeln!(out, "p cnf {} {}", max, cnt)?;

        for &a in assumps {
            debug_assert!(self.v.value_lit(a) != lbool::FALSE);
            writeln!(
                out,
                "{}{} 0",
                if a.sign() { "" } else { "-" },
                map_var(a.var(), &mut map, &mut max) + 1
            )?;
        }

        for &cr in &self.clauses {
            let c = self.v.ca.get_ref(cr);
            if self.v.satisfied(c) {
                continue;
            }
            for &l in c.lits() {
                if self.v.value_lit(l) != lbool::FALSE {
                    write!(
                        out,
                        "{}{} ",
                        if l.sign() { "" } else { "-" },
                        map_var(l.var(), &mut map, &mut max) + 1
                    )?;
                }
            }
            writeln!(out, "0")?;
        }
        Ok(())
    }
}

/// Temporary representation of a learnt clause, produced in `analyze`.
struct LearntClause<'a> {
    clause: &'a [Lit], // the clause
    backtrack_lvl: i32, // where to backtrack?
    symmetry: bool,     // derived using a symmetry, directly or transitively
    first_symmetry: bool,
    compat: CompatSet,
}

#[derive(Clone, Copy, Debug)]
enum ResolveWith {
    Init(CRef),         // initial conflict
    Resolve(Lit, CRef), // propagation of lit because of clause
}

/// Tell every generator watching a literal of the domain that `p` entered
/// the trail; when `p` was forced by an incompatible symmetry clause, the
/// stabilizer bookkeeping of the touched generators is updated first.
fn notify_symmetries_enqueue(
    vars: &VarState,
    ca: &ClauseAllocator,
    watcher_syms: &LMap<Vec<SymId>>,
    symmetries: &mut Vec<Symmetry>,
    p: Lit,
) {
    let cr = vars.reason(p.var());
    if cr != CRef::UNDEF {
        let c = ca.get_ref(cr);
        if c.symmetry() {
            let compat = c.compat();
            for &l in c.lits() {
                if !watcher_syms.has(l) {
                    continue;
                }
                for &sid in watcher_syms[l].iter() {
                    let sym = &mut symmetries[sid as usize];
                    if sym.is_stab() && compat.map_or(true, |cs| !cs.contains(sid)) {
                        sym.notify_reason_of_breaked(p);
                    }
                }
            }
        }
    }

    if watcher_syms.has(p) {
        for &sid in watcher_syms[p].iter() {
            symmetries[sid as usize].notify_enqueued(p, vars);
        }
    }
}

/// Inverse of [`notify_symmetries_enqueue`], fired while the assignment of
/// `p` is still visible.
fn notify_symmetries_backtrack(
    vars: &VarState,
    ca: &ClauseAllocator,
    watcher_syms: &LMap<Vec<SymId>>,
    symmetries: &mut Vec<Symmetry>,
    p: Lit,
) {
    let cr = vars.reason(p.var());
    if cr != CRef::UNDEF && ca.get_ref(cr).symmetry() {
        for &l in ca.get_ref(cr).lits() {
            if !watcher_syms.has(l) {
                continue;
            }
            for &sid in watcher_syms[l].iter() {
                symmetries[sid as usize].cancel_reason_of_breaked(p, vars);
            }
        }
    }

    if watcher_syms.has(p) {
        for &sid in watcher_syms[p].iter() {
            symmetries[sid as usize].notify_backtrack(p, vars);
        }
    }
}

impl SolverV {
    #[inline(always)]
    pub fn num_assigns(&self) -> u32 {
        self.vars.num_assigns()
    }

    #[inline(always)]
    fn num_vars(&self) -> u32 {
        self.next_var.idx()
    }

    #[inline(always)]
    pub fn level(&self, x: Var) -> i32 {
        self.vars.level(x)
    }

    #[inline(always)]
    pub fn level_lit(&self, x: Lit) -> i32 {
        self.level(x.var())
    }

    #[inline(always)]
    pub fn value(&self, x: Var) -> lbool {
        self.vars.value(x)
    }

    #[inline(always)]
    pub fn value_lit(&self, x: Lit) -> lbool {
        self.vars.value_lit(x)
    }

    fn order_heap(&mut self) -> Heap<Var, VarOrder> {
        self.order_heap_data.promote(VarOrder {
            activity: &self.vars.activity,
        })
    }

    fn set_decision_var(&mut self, v: Var, b: bool) {
        if b && !self.decision[v] {
            self.dec_vars += 1;
        } else if !b && self.decision[v] {
            self.dec_vars -= 1;
        }
        self.decision[v] = b;
        self.insert_var_order(v);
    }

    fn insert_var_order(&mut self, x: Var) {
        if !self.order_heap().in_heap(x) && self.decision[x] {
            self.order_heap().insert(x);
        }
    }

    fn cla_decay_activity(&mut self) {
        self.cla_inc *= 1.0 / self.clause_decay;
    }

    fn cla_bump_activity(&mut self, learnts: &[CRef], cr: CRef) {
        let new_activity = {
            let mut c = self.ca.get_mut(cr);
            let r = c.activity() + self.cla_inc as f32;
            c.set_activity(r);
            r
        };
        if new_activity > 1e20 {
            // Rescale:
            for &learnt in learnts.iter() {
                let mut c = self.ca.get_mut(learnt);
                let r = c.activity() * 1e-20;
                c.set_activity(r);
            }
            self.cla_inc *= 1e-20;
        }
    }

    /// Pick a literal to make a decision with
    fn pick_branch_lit(&mut self) -> Lit {
        let mut next = Var::UNDEF;

        // Random decision:
        if utils::drand(&mut self.random_seed) < self.random_var_freq
            && !self.order_heap().is_empty()
        {
            let idx_tmp =
                utils::irand(&mut self.random_seed, self.order_heap_data.len() as i32) as usize;
            next = self.order_heap_data[idx_tmp];
            if self.value(next) == lbool::UNDEF && self.decision[next] {
                self.rnd_decisions += 1;
            }
        }

        // Activity based decision:
        while next == Var::UNDEF || self.value(next) != lbool::UNDEF || !self.decision[next] {
            let mut order_heap = self.order_heap();
            if order_heap.is_empty() {
                next = Var::UNDEF;
                break;
            } else {
                next = order_heap.remove_min();
            }
        }

        // Choose polarity based on different polarity modes (global or per-variable):
        if next == Var::UNDEF {
            Lit::UNDEF
        } else if self.user_pol[next] != lbool::UNDEF {
            Lit::new(next, self.user_pol[next] == lbool::TRUE)
        } else if self.rnd_pol {
            Lit::new(next, utils::drand(&mut self.random_seed) < 0.5)
        } else {
            Lit::new(next, self.polarity[next])
        }
    }

    fn watches(&mut self) -> OccLists<Lit, Watcher, WatcherDeleted> {
        self.watches_data.promote(WatcherDeleted { ca: &self.ca })
    }

    fn new_var(&mut self, upol: lbool, dvar: bool) -> Var {
        let v = self.free_vars.pop().unwrap_or_else(|| {
            let v = self.next_var;
            self.next_var = Var::from_idx(self.next_var.idx() + 1);
            v
        });
        self.watches().init(Lit::new(v, false));
        self.watches().init(Lit::new(v, true));
        self.watcher_syms.reserve_default(Lit::new(v, false));
        self.watcher_syms.reserve_default(Lit::new(v, true));
        self.vars.ass.insert_default(v, lbool::UNDEF);
        self.vars
            .vardata
            .insert_default(v, VarData::new(CRef::UNDEF, 0));
        if self.rnd_init_act {
            self.vars
                .activity
                .insert_default(v, utils::drand(&mut self.random_seed) * 0.00001);
        } else {
            self.vars.activity.insert_default(v, 0.0);
        }
        self.seen.insert_default(v, Seen::UNDEF);
        self.polarity.insert_default(v, false);
        self.user_pol.insert_default(v, upol);
        self.decision.reserve_default(v);
        let len = self.vars.trail.len();
        if v.idx() as usize > len {
            self.vars.trail.reserve(v.idx() as usize + 1 - len);
        }
        self.set_decision_var(v, dvar);
        v
    }

    /// Enqueue `p` with the given justification and tell the symmetries.
    fn unchecked_enqueue(&mut self, p: Lit, from: CRef) {
        self.vars.unchecked_enqueue(p, from);
        notify_symmetries_enqueue(
            &self.vars,
            &self.ca,
            &self.watcher_syms,
            &mut self.symmetries,
            p,
        );
    }

    /// Replay the level-0 trail to the symmetry watchers and the order
    /// hook. Replayed notifications are ignored by generators that already
    /// saw the literal.
    fn notify_cnf_units(&mut self) {
        debug_assert_eq!(self.decision_level(), 0);
        for i in 0..self.vars.trail.len() {
            let l = self.vars.trail[i];
            notify_symmetries_enqueue(
                &self.vars,
                &self.ca,
                &self.watcher_syms,
                &mut self.symmetries,
                l,
            );
            if let Some(order) = self.order.as_mut() {
                order.update_notify(l);
            }
        }
    }

    /// Enqueue the unit clauses the order engine wants to inject; their
    /// variables are owed to the symmetry order.
    fn inject_order_units(&mut self) {
        debug_assert_eq!(self.decision_level(), 0);
        loop {
            let has = self
                .order
                .as_ref()
                .map_or(false, |o| o.has_clause_to_inject(InjectKind::Units, None));
            if !has {
                return;
            }
            let lits = self
                .order
                .as_mut()
                .unwrap()
                .clause_to_inject(InjectKind::Units, None);
            debug_assert_eq!(lits.len(), 1);
            let l = lits[0];
            if self.value_lit(l) == lbool::UNDEF {
                self.symmetry_units.insert(l.var());
                self.unchecked_enqueue(l, CRef::UNDEF);
            }
        }
    }

    /// Attach a clause offered by the order engine: learnt, symmetry-tagged
    /// with no reuse claim.
    fn inject_order_clause(&mut self, learnts: &mut Vec<CRef>, kind: InjectKind, p: Option<Lit>) {
        let has = self
            .order
            .as_ref()
            .map_or(false, |o| o.has_clause_to_inject(kind, p));
        if !has {
            return;
        }
        let sbp = self.order.as_mut().unwrap().clause_to_inject(kind, p);
        debug_assert!(sbp.len() >= 2);
        debug_assert!(sbp.iter().all(|&l| self.value_lit(l) == lbool::FALSE));
        let cr = self
            .ca
            .alloc_with_symmetry(&sbp, true, true, Some(CompatSet::new()));
        learnts.push(cr);
        self.attach_clause(cr);
    }

    /// Analyze conflict and produce a reason clause.
    ///
    /// # Pre-conditions:
    ///
    /// - current decision level must be greater than root level.
    ///
    /// # Post-conditions:
    ///
    /// - `out_learnt[0]` is the asserting literal at level `backtrack_lvl`.
    /// - if `out_learnt.size() > 1` then `out_learnt[1]` has the greatest decision level of the
    ///   rest of literals. There may be others from the same level though.
    /// - the returned compatibility set only matters when `symmetry` is set:
    ///   it is the intersection of the compat sets of all symmetry-tagged
    ///   antecedents, enlarged with every generator stabilizing the clause.
    fn analyze<'a>(
        &mut self,
        orig: CRef,
        learnts: &[CRef],
        out_learnt: &'a mut Vec<Lit>,
    ) -> LearntClause<'a> {
        out_learnt.clear();

        debug!("analyze.start {:?}", orig);
        let conflict_level = self.decision_level() as i32;
        debug_assert!(conflict_level > 0);

        let mut out_symmetry = false;
        let fsym = self.ca.get_ref(orig).first_symmetry();
        let mut conf_clauses: Vec<CRef> = vec![];

        let mut cur_clause = ResolveWith::Init(orig);
        let mut path_c = 0;
        let mut p;

        out_learnt.push(Lit::UNDEF); // leave room for the asserting literal

        let mut index = self.vars.trail.len();

        loop {
            let cr = match cur_clause {
                ResolveWith::Init(cr) => cr,
                ResolveWith::Resolve(_lit, cr) => {
                    debug_assert_ne!(cr, CRef::UNDEF, "analyze: reached a decision literal");
                    cr
                }
            };

            {
                let c = self.ca.get_ref(cr);
                if c.symmetry() {
                    out_symmetry = true;
                    conf_clauses.push(cr);
                }
            }
            // bump activity if `cr` is a learnt clause
            if self.ca.get_ref(cr).learnt() {
                self.cla_bump_activity(learnts, cr);
            }

            let lits = self.ca.get_ref(cr).lits();
            // when resolving against the reason of `p`, skip its first
            // literal (`p` itself), it can't appear in the learnt clause
            let lits = match cur_clause {
                ResolveWith::Init(_) => lits,
                ResolveWith::Resolve(lit, _) => {
                    debug_assert_eq!(lit.var(), lits[0].var());
                    &lits[1..]
                }
            };

            for &q in lits {
                let lvl = self.vars.level(q.var());
                debug_assert!(lvl <= conflict_level);
                if lvl == 0 && self.symmetry_units.has(q.var()) {
                    out_symmetry = true;
                }
                if !self.seen[q.var()].is_seen() && lvl > 0 {
                    self.vars
                        .var_bump_activity(&mut self.order_heap_data, q.var());
                    self.seen[q.var()] = Seen::SOURCE;
                    if lvl == conflict_level {
                        // at conflict level: need to eliminate this lit by resolution
                        path_c += 1;
                    } else {
                        out_learnt.push(q); // part of the learnt clause
                    }
                }
            }

            // Select next literal in the trail to look at:
            while !self.seen[self.vars.trail[index - 1].var()].is_seen() {
                debug_assert_eq!(
                    self.vars.level(self.vars.trail[index - 1].var()),
                    conflict_level
                );
                index -= 1;
            }

            p = self.vars.trail[index - 1];
            index -= 1;
            cur_clause = ResolveWith::Resolve(p, self.vars.reason(p.var()));
            self.seen[p.var()] = Seen::UNDEF;
            path_c -= 1;

            if path_c <= 0 {
                break;
            }
        }

        debug_assert_ne!(p, Lit::UNDEF);
        debug_assert_eq!(self.value_lit(p), lbool::TRUE);
        out_learnt[0] = !p;

        trace!("analyze-learnt: {:?} (before minimization)", &out_learnt);
        self.max_literals += out_learnt.len() as u64;

        self.minimize_conflict(out_learnt);

        // Find correct backtrack level:
        let btlevel = if out_learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            let mut max_level = self.level(out_learnt[max_i].var());
            // Find the first literal assigned at the next-highest level:
            for i in 2..out_learnt.len() {
                let level = self.level(out_learnt[i].var());
                if level > max_level {
                    max_i = i;
                    max_level = level;
                }
            }
            // Swap-in this literal at index 1:
            out_learnt.swap(max_i, 1);
            self.level_lit(out_learnt[1])
        };

        for &lit in &self.analyze_toclear {
            self.seen[lit.var()] = Seen::UNDEF; // (`seen[]` is now cleared)
        }
        debug_assert!(out_learnt
            .iter()
            .all(|&l| self.value_lit(l) == lbool::FALSE));

        // Compatibility set of the learnt clause: intersect the compat sets
        // of the symmetry-tagged antecedents, then add every generator that
        // stabilizes the result.
        let mut compat = CompatSet::new();
        if out_symmetry {
            if !fsym {
                let mut seeded = false;
                for &cr in &conf_clauses {
                    let check = self
                        .ca
                        .get_ref(cr)
                        .compat()
                        .expect("symmetry clause without compatibility set");
                    if check.is_empty() {
                        compat.clear();
                        break;
                    }
                    if !seeded {
                        compat = check.clone();
                        seeded = true;
                        continue;
                    }
                    compat.intersect_with(check);
                    if compat.is_empty() {
                        break;
                    }
                }
            }
            for s in (0..self.symmetries.len()).rev() {
                let sym = &self.symmetries[s];
                if compat.contains(sym.id()) {
                    continue;
                }
                if sym.stabilize(out_learnt) {
                    compat.insert(sym.id());
                }
            }
        }

        LearntClause {
            clause: out_learnt,
            backtrack_lvl: btlevel,
            symmetry: out_symmetry,
            first_symmetry: fsym,
            compat,
        }
    }

    /// An abstraction of the level of a variable
    #[inline]
    fn abstract_level(&self, v: Var) -> u32 {
        1 << (self.level(v) & 31)
    }

    fn minimize_conflict(&mut self, out_learnt: &mut Vec<Lit>) {
        // Simplify conflict clause:
        self.analyze_toclear.clear();
        self.analyze_toclear.extend_from_slice(&out_learnt);
        let new_size = if self.ccmin_mode == 2 {
            let mut abstract_levels = 0;
            for a in out_learnt[1..].iter() {
                abstract_levels |= self.abstract_level(a.var())
            }

            let mut j = 1;
            for i in 1..out_learnt.len() {
                let lit = out_learnt[i];
                // can eliminate `lit` only if it's redundant *and* not a decision
                if self.reason(lit.var()) == CRef::UNDEF || !self.lit_redundant(lit, abstract_levels)
                {
                    out_learnt[j] = lit;
                    j += 1;
                }
            }
            j
        } else if self.ccmin_mode == 1 {
            let mut j = 1;
            for i in 1..out_learnt.len() {
                let lit = out_learnt[i];
                let x = lit.var();
                let reason = self.reason(x);

                let mut retain = true;
                if reason == CRef::UNDEF {
                    debug_assert!(self.level(x) > 0);
                } else {
                    retain = false;
                    let c = self.ca.get_ref(reason);
                    for k in 1..c.size() {
                        let v = c[k].var();
                        if !self.seen[v].is_seen() && self.level(v) > 0 {
                            retain = true;
                            break;
                        }
                    }
                }
                if retain {
                    out_learnt[j] = lit;
                    j += 1;
                }
            }
            j
        } else {
            out_learnt.len()
        };

        self.tot_literals += new_size as u64;
        debug_assert!(new_size <= out_learnt.len());
        out_learnt.truncate(new_size);
    }

    /// Specialized analysis procedure to express the final conflict in terms of assumptions.
    /// Calculates the (possibly empty) set of assumptions that led to the assignment of `p`, and
    /// stores the result in `out_conflict`.
    fn analyze_final(&mut self, p: Lit, out_conflict: &mut LSet) {
        out_conflict.clear();
        out_conflict.insert(p);
        debug!("analyze_final lit={:?}", p);

        if self.decision_level() == 0 {
            return; // no assumptions
        }

        self.seen[p.var()] = Seen::SOURCE;

        for &lit in self.vars.trail[self.vars.trail_lim[0] as usize..]
            .iter()
            .rev()
        {
            let x = lit.var();
            if self.seen[x].is_seen() {
                let reason = self.reason(x);
                if reason == CRef::UNDEF {
                    debug_assert!(self.level(x) > 0);
                    out_conflict.insert(!lit);
                } else {
                    let c = self.ca.get_ref(reason);
                    for j in 1..c.size() {
                        if self.vars.level(c[j].var()) > 0 {
                            self.seen[c[j].var()] = Seen::SOURCE;
                        }
                    }
                }
                self.seen[x] = Seen::UNDEF;
            }
        }

        self.seen[p.var()] = Seen::UNDEF;
        debug_assert!(self.seen.iter().all(|(_, &s)| s == Seen::UNDEF));
    }

    /// Check if `p` can be removed from a conflict clause `C`.
    ///
    /// It can be removed from `C` if it is propagation-implied
    /// by literals of level 0 exclusively or if `C x p.reason` subsumes `C`.
    fn lit_redundant(&mut self, p: Lit, abstract_levels: u32) -> bool {
        self.minimize_stack.clear();
        self.minimize_stack.push(p);

        let top = self.analyze_toclear.len();

        while self.minimize_stack.len() > 0 {
            let q = *self.minimize_stack.last().unwrap();
            let cr = self.reason(q.var());
            debug_assert_ne!(cr, CRef::UNDEF);
            self.minimize_stack.pop();

            let c = self.ca.get_ref(cr);
            // `q` comes from some propagation with `c`, check if these lits can
            // also be eliminated or are already in the learnt clause
            for &l in c.lits()[1..].iter() {
                // Variable at level 0 or previously removable: just skip
                if self.vars.level(l.var()) == 0 || self.seen[l.var()] == Seen::SOURCE {
                    continue;
                }

                if self.reason(l.var()) != CRef::UNDEF
                    && (self.abstract_level(l.var()) & abstract_levels) != 0
                {
                    self.seen[l.var()] = Seen::SOURCE;
                    self.minimize_stack.push(l);
                    self.analyze_toclear.push(l);
                } else {
                    // cannot remove `l`, cancel
                    for a in self.analyze_toclear[top..].iter() {
                        self.seen[a.var()] = Seen::UNDEF;
                    }
                    self.analyze_toclear.truncate(top);
                    return false;
                }
            }
        }

        true
    }

    /// Propagates all enqueued facts to fixpoint, then lets the active
    /// symmetries (and, optionally, the weakly inactive ones) propagate.
    ///
    /// If a conflict arises, the conflicting clause is returned,
    /// otherwise `None`.
    ///
    /// # Post-conditions:
    ///
    /// - the propagation queue is empty, even if there was a conflict.
    fn propagate(&mut self, learnts: &mut Vec<CRef>) -> Option<CRef> {
        let mut confl = None;
        let mut num_props: u32 = 0;

        while (self.qhead as usize) < self.vars.trail.len() {
            // `p` is the next enqueued fact to propagate.
            let p = self.vars.trail[self.qhead as usize];
            self.qhead += 1;

            // derivations out of a symmetry unit are themselves owed to symmetry
            let symmetry_level_zero =
                self.decision_level() == 0 && self.symmetry_units.has(p.var());

            let watches_data_ptr: *mut OccListsData<_, _> = &mut self.watches_data;
            let ws = self
                .watches_data
                .lookup_mut_pred(p, &WatcherDeleted { ca: &self.ca });
            let mut i: usize = 0;
            let mut j: usize = 0;
            let end: usize = ws.len();
            num_props += 1;
            'clauses: while i < end {
                // Try to avoid inspecting the clause:
                let blocker = ws[i].blocker;
                if self.vars.value_lit(blocker) == lbool::TRUE {
                    ws[j] = ws[i];
                    j += 1;
                    i += 1;
                    continue;
                }

                // Make sure the false literal is data[1]:
                let cr = ws[i].cref;
                let mut c = self.ca.get_mut(cr);
                let false_lit = !p;
                if c[0] == false_lit {
                    c[0] = c[1];
                    c[1] = false_lit;
                }
                debug_assert_eq!(c[1], false_lit);
                i += 1;

                // If 0th watch is true, then clause is already satisfied.
                let first = c[0];
                let w = Watcher::new(cr, first);
                if first != blocker && self.vars.value_lit(first) == lbool::TRUE {
                    ws[j] = w;
                    j += 1;
                    continue;
                }

                // Look for new watch:
                for k in 2..c.size() {
                    if self.vars.value_lit(c[k]) != lbool::FALSE {
                        c[1] = c[k];
                        c[k] = false_lit;

                        // safe because `!c[1] != p`, so watches are not aliased
                        debug_assert_ne!(!c[1], p);
                        unsafe { &mut (&mut *watches_data_ptr)[!c[1]] }.push(w);
                        continue 'clauses;
                    }
                }

                // Did not find watch -- clause is unit under assignment:
                ws[j] = w;
                j += 1;
                if self.vars.value_lit(first) == lbool::FALSE {
                    confl = Some(cr);
                    self.qhead = self.vars.trail.len() as i32;
                    // Copy the remaining watches:
                    while i < end {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                } else {
                    if symmetry_level_zero {
                        self.symmetry_units.insert(first.var());
                    }
                    self.vars.unchecked_enqueue(first, cr);
                    notify_symmetries_enqueue(
                        &self.vars,
                        &self.ca,
                        &self.watcher_syms,
                        &mut self.symmetries,
                        first,
                    );
                }
            }
            let dummy = Watcher::DUMMY;
            ws.resize(j, dummy);

            if self.esbp_end && self.order.is_some() {
                if let Some(order) = self.order.as_mut() {
                    order.update_notify(p);
                }
                self.inject_order_clause(learnts, InjectKind::Esbp, Some(p));
            }

            // weakly active symmetry propagation; `qhead == trail.len()`
            // keeps it strictly after the unit propagation fixpoint
            let mut s = self.symmetries.len();
            while s > 0 && self.qhead as usize == self.vars.trail.len() && confl.is_none() {
                s -= 1;
                if !self.symmetries[s].is_active() {
                    continue;
                }
                let orig = self.symmetries[s].next_to_propagate(&self.vars, &self.symmetry_units);
                if let Some(orig) = orig {
                    confl = self.propagate_symmetrical(learnts, s, orig);
                }
            }

            // weakly inactive symmetry propagation
            if self.inactive_opt {
                let mut s = self.symmetries.len();
                while s > 0 && self.qhead as usize == self.vars.trail.len() && confl.is_none() {
                    s -= 1;
                    {
                        let sym = &self.symmetries[s];
                        if sym.is_active() || !sym.is_stab() || !sym.is_stab_level_zero(&self.vars)
                        {
                            continue;
                        }
                    }
                    let orig =
                        self.symmetries[s].next_to_propagate(&self.vars, &self.symmetry_units);
                    if let Some(orig) = orig {
                        confl = self.propagate_symmetrical(learnts, s, orig);
                    }
                }
            }

            if confl.is_some() {
                self.qhead = self.vars.trail.len() as i32;
            }
        }
        self.propagations += num_props as u64;
        self.simp_db_props -= num_props as i64;

        confl
    }

    /// Derive the symmetrical counterpart of `l` through generator `s`.
    ///
    /// The reason of `l` is mapped through the generator into a clause that
    /// either propagates the image of `l` (returning `None`) or is
    /// conflicting (returning it). A level-0 reason-less `l` yields the
    /// binary `[image(l), ¬l]`. The solver first backtracks to the level of
    /// the second literal so the watches attach where the clause becomes
    /// asserting.
    fn propagate_symmetrical(
        &mut self,
        learnts: &mut Vec<CRef>,
        s: usize,
        l: Lit,
    ) -> Option<CRef> {
        debug_assert!(self.value_lit(self.symmetries[s].image(l)) != lbool::TRUE);
        self.sympropagations += 1;

        let mut implic = mem::replace(&mut self.implic_tmp, vec![]);
        implic.clear();
        let is_sym;
        let compat;
        if self.level_lit(l) == 0 {
            debug_assert!(!self.symmetry_units.has(l.var()));
            implic.push(self.symmetries[s].image(l));
            implic.push(!l);
            is_sym = false;
            compat = CompatSet::new();
        } else {
            let r = self.reason(l.var());
            debug_assert_ne!(r, CRef::UNDEF);
            let c = self.ca.get_ref(r);
            is_sym = c.symmetry();
            compat = c.compat().cloned().unwrap_or_default();
            self.symmetries[s].sorted_symmetrical_clause(c.lits(), &self.vars, &mut implic);
        }

        let watch_lvl = self.level_lit(implic[1]);
        if self.decision_level() > watch_lvl as u32 {
            self.cancel_until(watch_lvl as u32);
        }
        debug_assert!(self.value_lit(implic[0]) != lbool::TRUE);
        debug_assert_eq!(self.value_lit(implic[1]), lbool::FALSE);

        trace!("symmetry clause {:?} (from {:?})", &implic, l);
        let cr = self
            .ca
            .alloc_with_symmetry(&implic, !is_sym, true, Some(compat));
        let res = if self.value_lit(implic[0]) == lbool::UNDEF {
            if self.add_propagation_clauses {
                learnts.push(cr);
                self.attach_clause(cr);
                self.cla_bump_activity(learnts, cr);
            }
            self.unchecked_enqueue(implic[0], cr);
            None
        } else {
            debug_assert_eq!(self.value_lit(implic[0]), lbool::FALSE);
            if self.add_conflict_clauses {
                learnts.push(cr);
                self.attach_clause(cr);
                self.cla_bump_activity(learnts, cr);
            }
            self.symconflicts += 1;
            Some(cr)
        };
        self.implic_tmp = implic;
        res
    }

    fn rebuild_order_heap(&mut self) {
        let mut vs = vec![];
        for v in (0..self.num_vars()).map(Var::from_idx) {
            if self.decision[v] && self.value(v) == lbool::UNDEF {
                vs.push(v);
            }
        }
        self.order_heap().build(&vs);
    }

    /// Move to the given clause allocator, where clause indices might differ
    fn reloc_all(
        &mut self,
        learnts: &mut Vec<CRef>,
        clauses: &mut Vec<CRef>,
        to: &mut ClauseAllocator,
    ) {
        macro_rules! is_removed {
            ($ca:expr, $cr:expr) => {
                $ca.get_ref($cr).mark() == 1
            };
        }
        // All watchers:
        self.watches().clean_all();
        for v in (0..self.num_vars()).map(Var::from_idx) {
            for s in 0..2 {
                let p = Lit::new(v, s != 0);
                for watch in &mut self.watches_data[p] {
                    self.ca.reloc(&mut watch.cref, to);
                }
            }
        }

        // All reasons:
        for &lit in &self.vars.trail {
            let v = lit.var();

            // Note: it is not safe to call `locked()` on a relocated clause. This is why we keep
            // `dangling` reasons here. It is safe and does not hurt.
            let reason = self.vars.reason(v);
            if reason != CRef::UNDEF {
                let cond = {
                    let c = self.ca.get_ref(reason);
                    c.reloced() || self.locked(c)
                };
                if cond {
                    debug_assert!(!is_removed!(self.ca, reason));
                    self.ca.reloc(&mut self.vars.vardata[v].reason, to);
                }
            }
        }

        // All learnt:
        {
            let mut j = 0;
            for i in 0..learnts.len() {
                let mut cr = learnts[i];
                if !is_removed!(self.ca, cr) {
                    self.ca.reloc(&mut cr, to);
                    learnts[j] = cr;
                    j += 1;
                }
            }
            learnts.truncate(j);
        }

        // All original:
        {
            let mut j = 0;
            for i in 0..clauses.len() {
                let mut cr = clauses[i];
                if !is_removed!(self.ca, cr) {
                    self.ca.reloc(&mut cr, to);
                    clauses[j] = cr;
                    j += 1;
                }
            }
            clauses.truncate(j);
        }
    }

    /// Attach a clause to watcher lists
    fn attach_clause(&mut self, cr: CRef) {
        let (c0, c1, learnt, size) = {
            let c = self.ca.get_ref(cr);
            debug_assert!(c.size() > 1);
            (c[0], c[1], c.learnt(), c.size())
        };
        self.watches()[!c0].push(Watcher::new(cr, c1));
        self.watches()[!c1].push(Watcher::new(cr, c0));
        if learnt {
            self.num_learnts += 1;
            self.learnts_literals += size as u64;
        } else {
            self.num_clauses += 1;
            self.clauses_literals += size as u64;
        }
    }

    /// Revert to the state at given level (keeping all assignment at `level` but not beyond).
    ///
    /// Symmetries and the order hook are told about every removed literal
    /// while its assignment is still visible.
    fn cancel_until(&mut self, level: u32) {
        if self.decision_level() <= level {
            return;
        }
        let trail_lim_last = *self.vars.trail_lim.last().expect("trail_lim is empty") as usize;
        let trail_lim_level = self.vars.trail_lim[level as usize] as usize;
        for c in (trail_lim_level..self.vars.trail.len()).rev() {
            let lit = self.vars.trail[c];
            let x = lit.var();
            notify_symmetries_backtrack(
                &self.vars,
                &self.ca,
                &self.watcher_syms,
                &mut self.symmetries,
                lit,
            );
            if let Some(order) = self.order.as_mut() {
                order.update_cancel(lit);
            }
            self.vars.ass[x] = lbool::UNDEF;
            if self.phase_saving > 1 || (self.phase_saving == 1 && c > trail_lim_last) {
                self.polarity[x] = lit.sign();
            }
            self.insert_var_order(x);
        }
        self.qhead = trail_lim_level as i32;
        self.vars.trail.truncate(trail_lim_level);
        self.vars.trail_lim.truncate(level as usize);
    }

    /// Detach a clause from watcher lists.
    ///
    /// param `strict` means we remove the clause from watchers eagerly, instead
    /// of just marking the watchlist as "dirty"
    fn detach_clause(&mut self, cr: CRef, strict: bool) {
        let (c0, c1, csize, clearnt) = {
            let c = self.ca.get_ref(cr);
            (c[0], c[1], c.size(), c.learnt())
        };
        debug_assert!(csize > 1);

        let mut watches = self.watches_data.promote(WatcherDeleted { ca: &self.ca });

        // Strict or lazy detaching:
        if strict {
            let pos = watches[!c0]
                .iter()
                .position(|x| x == &Watcher::new(cr, c1))
                .expect("Watcher not found");
            watches[!c0].remove(pos);
            let pos = watches[!c1]
                .iter()
                .position(|x| x == &Watcher::new(cr, c0))
                .expect("Watcher not found");
            watches[!c1].remove(pos);
        } else {
            watches.smudge(!c0);
            watches.smudge(!c1);
        }

        if clearnt {
            self.num_learnts -= 1;
            self.learnts_literals -= csize as u64;
        } else {
            self.num_clauses -= 1;
            self.clauses_literals -= csize as u64;
        }
    }

    /// Detach and free a clause.
    fn remove_clause(&mut self, cr: CRef) {
        self.detach_clause(cr, false);
        {
            let c = self.ca.get_ref(cr);
            // Don't leave pointers to free'd memory!
            if self.locked(c) {
                self.vars.vardata[c[0].var()].reason = CRef::UNDEF;
            }
        }
        self.ca.get_mut(cr).set_mark(1); // used in reloc
        self.ca.free(cr);
    }

    pub fn satisfied(&self, c: ClauseRef) -> bool {
        c.iter().any(|&lit| self.value_lit(lit) == lbool::TRUE)
    }

    #[inline(always)]
    pub fn decision_level(&self) -> u32 {
        self.vars.decision_level()
    }

    #[inline(always)]
    fn reason(&self, x: Var) -> CRef {
        self.vars.reason(x)
    }

    /// Returns `true` if a clause is a reason for some implication in the current state.
    fn locked(&self, c: ClauseRef) -> bool {
        let reason = self.reason(c[0].var());
        self.value_lit(c[0]) == lbool::TRUE
            && reason != CRef::UNDEF
            && self.ca.get_ref(reason) == c
    }

    fn progress_estimate(&self) -> f64 {
        let mut progress = 0.0;
        let f = 1.0 / self.num_vars() as f64;

        for i in 0..self.decision_level() + 1 {
            let beg: i32 = if i == 0 {
                0
            } else {
                self.vars.trail_lim[i as usize - 1]
            };
            let end: i32 = if i == self.decision_level() {
                self.vars.trail.len() as i32
            } else {
                self.vars.trail_lim[i as usize]
            };
            progress += f64::powi(f, i as i32) * (end - beg) as f64;
        }

        progress / self.num_vars() as f64
    }

    fn new(opts: &SolverOpts) -> Self {
        Self {
            vars: VarState::new(opts),
            num_clauses: 0,
            num_learnts: 0,
            clauses_literals: 0,
            learnts_literals: 0,

            clause_decay: opts.clause_decay,
            random_var_freq: opts.random_var_freq,
            random_seed: opts.random_seed,
            luby_restart: opts.luby_restart,
            ccmin_mode: opts.ccmin_mode,
            phase_saving: opts.phase_saving,
            rnd_pol: false,
            rnd_init_act: opts.rnd_init_act,
            garbage_frac: opts.garbage_frac,
            min_learnts_lim: opts.min_learnts_lim,
            restart_first: opts.restart_first,
            restart_inc: opts.restart_inc,

            add_propagation_clauses: opts.storing,
            add_conflict_clauses: opts.storing,
            inverting_opt: opts.inverting_opt,
            inactive_opt: opts.inactive_opt,
            esbp_end: opts.esbp_end,

            // Parameters (experimental):
            learntsize_adjust_start_confl: 100,
            learntsize_adjust_inc: 1.5,

            // Statistics: (formerly in 'SolverStats')
            solves: 0,
            starts: 0,
            decisions: 0,
            rnd_decisions: 0,
            propagations: 0,
            conflicts: 0,
            sympropagations: 0,
            symconflicts: 0,
            dec_vars: 0,
            max_literals: 0,
            tot_literals: 0,

            // Parameters (the rest):
            learntsize_factor: 1.0 / 3.0,
            learntsize_inc: 1.1,

            polarity: VMap::new(),
            user_pol: VMap::new(),
            decision: VMap::new(),
            watches_data: OccListsData::new(),
            order_heap_data: HeapData::new(),
            ok: true,
            cla_inc: 1.0,
            qhead: 0,
            simp_db_assigns: -1,
            simp_db_props: 0,
            progress_estimate: 0.0,
            remove_satisfied: true,
            next_var: Var::from_idx(0),

            ca: ClauseAllocator::new(),
            free_vars: vec![],
            released_vars: vec![],
            assumptions: vec![],

            symmetries: vec![],
            watcher_syms: LMap::new(),
            symmetry_units: IntSet::new(),
            inverting_syms: 0,
            order: None,

            seen: VMap::new(),
            minimize_stack: vec![],
            analyze_toclear: vec![],
            implic_tmp: vec![],
            max_learnts: 0.0,
            learntsize_adjust_confl: 0.0,
            learntsize_adjust_cnt: 0,

            // Resource constraints:
            conflict_budget: -1,
            propagation_budget: -1,
        }
    }
}

impl VarState {
    fn new(opts: &SolverOpts) -> Self {
        Self {
            ass: VMap::new(),
            vardata: VMap::new(),
            activity: VMap::new(),
            var_inc: 1.0,
            var_decay: opts.var_decay,
            trail: vec![],
            trail_lim: vec![],
        }
    }

    #[inline(always)]
    pub fn num_assigns(&self) -> u32 {
        self.trail.len() as u32
    }

    /// Begins a new decision level.
    fn new_decision_level(&mut self) {
        let lvl = self.trail.len() as i32;
        self.trail_lim.push(lvl);
    }

    fn proved_at_lvl_0(&self) -> &[Lit] {
        // find where the end of the level-0 part of the trail is
        let end = self
            .trail_lim
            .get(0)
            .map_or(self.trail.len(), |&x| x as usize);
        &self.trail[..end]
    }

    #[inline(always)]
    pub fn value(&self, x: Var) -> lbool {
        self.ass[x]
    }

    #[inline(always)]
    pub(crate) fn value_lit(&self, x: Lit) -> lbool {
        self.ass[x.var()] ^ !x.sign()
    }

    #[inline(always)]
    pub(crate) fn level(&self, x: Var) -> i32 {
        self.vardata[x].level
    }

    #[inline(always)]
    pub(crate) fn reason(&self, x: Var) -> CRef {
        self.vardata[x].reason
    }

    #[inline(always)]
    pub(crate) fn has_reason(&self, x: Var) -> bool {
        self.vardata[x].reason != CRef::UNDEF
    }

    /// Decisions and assumptions: assigned literals with a level but no
    /// clausal justification.
    #[inline(always)]
    pub(crate) fn is_choice(&self, x: Var) -> bool {
        !self.has_reason(x) && self.level(x) > 0
    }

    fn var_decay_activity(&mut self) {
        self.var_inc *= 1.0 / self.var_decay;
    }

    #[inline(always)]
    pub(crate) fn decision_level(&self) -> u32 {
        self.trail_lim.len() as u32
    }

    fn unchecked_enqueue(&mut self, p: Lit, from: CRef) {
        debug_assert_eq!(
            self.value_lit(p),
            lbool::UNDEF,
            "lit {:?} should be undef",
            p
        );
        self.ass[p.var()] = lbool::new(p.sign());
        self.vardata[p.var()] = VarData::new(from, self.decision_level() as i32);
        self.trail.push(p);
    }

    /// Increase a variable with the current 'bump' value.
    fn var_bump_activity(&mut self, order_heap_data: &mut HeapData<Var>, v: Var) {
        let amount = self.var_inc;
        self.var_bump_activity_by(order_heap_data, v, amount);
    }

    fn var_bump_activity_by(&mut self, order_heap_data: &mut HeapData<Var>, v: Var, amount: f64) {
        self.activity[v] += amount;
        if self.activity[v] > 1e100 {
            // Rescale:
            for (_, x) in self.activity.iter_mut() {
                *x *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }

        // Update order_heap with respect to new activity:
        let mut order_heap = order_heap_data.promote(VarOrder {
            activity: &self.activity,
        });
        if order_heap.in_heap(v) {
            order_heap.update(v);
        }
    }
}

#[derive(Debug)]
enum ClauseSetSelect {
    Original,
    Learnt,
}

#[derive(Debug, Clone, Copy)]
struct VarData {
    reason: CRef,
    level: i32,
}

#[derive(Debug, Clone, Copy)]
struct Watcher {
    cref: CRef,
    blocker: Lit,
}

struct VarOrder<'a> {
    activity: &'a VMap<f64>,
}

/// Predicate to test whether a clause has been removed from some lit's watchlist
struct WatcherDeleted<'a> {
    ca: &'a ClauseAllocator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum Seen {
    UNDEF,
    SOURCE,
}

mod utils {
    /// Finite subsequences of the Luby-sequence:
    ///
    /// > 0: 1
    /// > 1: 1 1 2
    /// > 2: 1 1 2 1 1 2 4
    /// > 3: 1 1 2 1 1 2 4 1 1 2 1 1 2 4 8
    /// ...
    pub(super) fn luby(y: f64, mut x: i32) -> f64 {
        // Find the finite subsequence that contains index 'x', and the
        // size of that subsequence:
        let mut size = 1;
        let mut seq = 0;
        while size < x + 1 {
            seq += 1;
            size = 2 * size + 1;
        }

        while size - 1 != x {
            size = (size - 1) >> 1;
            seq -= 1;
            x = x % size;
        }

        return f64::powi(y, seq);
    }

    /// Generate a random double:
    pub(super) fn drand(seed: &mut f64) -> f64 {
        *seed *= 1389796.0;
        let q = (*seed / 2147483647.0) as i32;
        *seed -= q as f64 * 2147483647.0;
        return *seed / 2147483647.0;
    }

    /// Generate a random integer:
    pub(super) fn irand(seed: &mut f64, size: i32) -> i32 {
        (drand(seed) * size as f64) as i32
    }
}

impl Default for VarData {
    fn default() -> Self {
        Self {
            reason: CRef::UNDEF,
            level: 0,
        }
    }
}

impl VarData {
    #[inline(always)]
    pub(super) fn new(reason: CRef, level: i32) -> Self {
        Self { reason, level }
    }
}

impl PartialEq for Watcher {
    #[inline(always)]
    fn eq(&self, rhs: &Self) -> bool {
        self.cref == rhs.cref
    }
}
impl Eq for Watcher {}

impl<'a> Comparator<Var> for VarOrder<'a> {
    fn cmp(&self, lhs: &Var, rhs: &Var) -> cmp::Ordering {
        PartialOrd::partial_cmp(&self.activity[*rhs], &self.activity[*lhs])
            .expect("NaN activity")
            .then_with(|| Ord::cmp(&lhs.idx(), &rhs.idx()))
    }
}

impl<'a> DeletePred<Watcher> for WatcherDeleted<'a> {
    #[inline]
    fn deleted(&self, w: &Watcher) -> bool {
        self.ca.get_ref(w.cref).mark() == 1
    }
}

impl Default for Seen {
    #[inline]
    fn default() -> Self {
        Seen::UNDEF
    }
}

impl Seen {
    #[inline(always)]
    fn is_seen(&self) -> bool {
        *self != Seen::UNDEF
    }
}

impl Watcher {
    const DUMMY: Watcher = Watcher {
        cref: CRef::UNDEF,
        blocker: Lit::UNDEF,
    };
    fn new(cref: CRef, blocker: Lit) -> Self {
        Self { cref, blocker }
    }
}

pub struct SolverOpts {
    pub var_decay: f64,
    pub clause_decay: f64,
    pub random_var_freq: f64,
    pub random_seed: f64,
    pub ccmin_mode: i32,
    pub phase_saving: i32,
    pub rnd_init_act: bool,
    pub luby_restart: bool,
    pub restart_first: i32,
    pub restart_inc: f64,
    pub garbage_frac: f64,
    pub min_learnts_lim: i32,
    /// Store generated symmetry clauses (both propagation and conflict flavors).
    pub storing: bool,
    /// Adjust the initial variable order to make inverting symmetries faster.
    pub inverting_opt: bool,
    /// Conduct symmetry propagation for weakly inactive symmetries.
    pub inactive_opt: bool,
    /// Query the external order hook after each propagated literal.
    pub esbp_end: bool,
}

impl Default for SolverOpts {
    fn default() -> SolverOpts {
        Self {
            var_decay: 0.95,
            clause_decay: 0.999,
            random_var_freq: 0.0,
            random_seed: 91648253.0,
            ccmin_mode: 2,
            phase_saving: 2,
            rnd_init_act: false,
            luby_restart: true,
            restart_first: 100,
            restart_inc: 2.0,
            garbage_frac: 0.20,
            min_learnts_lim: 0,
            storing: true,
            inverting_opt: false,
            inactive_opt: false,
            esbp_end: true,
        }
    }
}

impl SolverOpts {
    /// Check that options are valid.
    pub fn check(&self) -> bool {
        (0.0 < self.var_decay && self.var_decay < 1.0)
            && (0.0 < self.clause_decay && self.clause_decay < 1.0)
            && (0.0 <= self.random_var_freq && self.random_var_freq <= 1.0)
            && (0.0 < self.random_seed && self.random_seed < f64::INFINITY)
            && (0 <= self.ccmin_mode && self.ccmin_mode <= 2)
            && (0 <= self.phase_saving && self.phase_saving <= 2)
            && 1 <= self.restart_first
            && (1.0 < self.restart_inc && self.restart_inc < f64::INFINITY)
            && (0.0 < self.garbage_frac && self.garbage_frac < f64::INFINITY)
            && 0 <= self.min_learnts_lim
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::callbacks::Basic;
    use crate::intmap::AsIndex;

    fn mk() -> Solver<Basic> {
        Solver::new(SolverOpts::default(), Basic::new())
    }

    fn lit(s: &mut Solver<Basic>, x: i32) -> Lit {
        Lit::new(s.var_of_int((x.abs() - 1) as u32), x > 0)
    }

    fn add(s: &mut Solver<Basic>, cl: &[i32]) -> bool {
        let mut lits: Vec<Lit> = cl.iter().map(|&x| lit(s, x)).collect();
        s.add_clause_reuse(&mut lits)
    }

    /// No reference held in the clause lists, watches or trail reasons may
    /// point at a relocated or removed clause.
    fn check_clause_refs(s: &Solver<Basic>) {
        let n = s.v.ca.num_clauses();
        for &cr in s.clauses.iter().chain(s.learnts.iter()) {
            assert!(cr.as_index() < n);
            let c = s.v.ca.get_ref(cr);
            assert!(!c.reloced());
            assert_ne!(c.mark(), 1);
        }
        for vi in 0..s.num_vars() {
            for sgn in 0..2 {
                let p = Lit::new(Var::from_idx(vi), sgn != 0);
                for w in s.v.watches_data[p].iter() {
                    assert!(w.cref.as_index() < n);
                    assert!(!s.v.ca.get_ref(w.cref).reloced());
                }
            }
        }
        for &trail_lit in &s.v.vars.trail {
            let r = s.v.vars.reason(trail_lit.var());
            if r != CRef::UNDEF {
                assert!(r.as_index() < n);
                assert!(!s.v.ca.get_ref(r).reloced());
            }
        }
    }

    #[test]
    fn test_sat_trivial() {
        let mut s = mk();
        assert!(add(&mut s, &[1, 2]));
        assert_eq!(s.solve_limited(&[]), lbool::TRUE);
        let m = s.get_model();
        assert!(m[0] == lbool::TRUE || m[1] == lbool::TRUE);
    }

    #[test]
    fn test_unsat_units() {
        let mut s = mk();
        assert!(add(&mut s, &[1]));
        add(&mut s, &[-1]);
        assert_eq!(s.solve_limited(&[]), lbool::FALSE);
        assert!(!s.is_ok());
        assert!(s.unsat_core().is_empty());
    }

    #[test]
    fn test_empty_clause() {
        let mut s = mk();
        assert!(!add(&mut s, &[]));
        assert!(!s.is_ok());
        assert_eq!(s.solve_limited(&[]), lbool::FALSE);
    }

    #[test]
    fn test_tautology_absorbed() {
        let mut s = mk();
        assert!(add(&mut s, &[1, -1]));
        assert_eq!(s.num_clauses(), 0);
        assert_eq!(s.solve_limited(&[]), lbool::TRUE);
    }

    #[test]
    fn test_unit_propagates_at_level_0() {
        let mut s = mk();
        add(&mut s, &[1]);
        add(&mut s, &[-1, 2]);
        assert!(s.simplify());
        let l2 = lit(&mut s, 2);
        assert_eq!(s.value_lvl_0(l2), lbool::TRUE);
        assert_eq!(s.proved_at_lvl_0().len(), 2);
    }

    #[test]
    fn test_assumption_conflict_is_minimal() {
        let mut s = mk();
        add(&mut s, &[1, 2]);
        add(&mut s, &[-1, 3]);
        add(&mut s, &[-3]);
        let (a2, a3) = (lit(&mut s, -2), lit(&mut s, -3));
        assert_eq!(s.solve_limited(&[a2, a3]), lbool::FALSE);
        // level-0 propagation forces 2, so the failed set is {-2} alone
        assert_eq!(s.unsat_core(), &[!a2][..]);
        assert!(s.unsat_core_contains_lit(!a2));
        assert!(!s.unsat_core_contains_var(a3.var()));
        assert!(s.is_ok());
        // still usable without assumptions
        assert_eq!(s.solve_limited(&[]), lbool::TRUE);
    }

    #[test]
    fn test_budget_exhaustion_is_recoverable() {
        let mut s = mk();
        add(&mut s, &[1, 2]);
        add(&mut s, &[-1, 2]);
        s.set_conflict_budget(0);
        s.set_propagation_budget(0);
        assert_eq!(s.solve_limited(&[]), lbool::UNDEF);
        s.budget_off();
        assert_eq!(s.solve_limited(&[]), lbool::TRUE);
    }

    fn add_pigeonhole3x2(s: &mut Solver<Basic>) {
        // p(i,j) = pigeon i in hole j, variable index i*2+j
        let p = |i: i32, j: i32| i * 2 + j + 1;
        for i in 0..3 {
            add(s, &[p(i, 0), p(i, 1)]);
        }
        for j in 0..2 {
            for i0 in 0..3 {
                for i1 in (i0 + 1)..3 {
                    add(s, &[-p(i0, j), -p(i1, j)]);
                }
            }
        }
    }

    fn row_swap(s: &mut Solver<Basic>, i0: i32, i1: i32) {
        let mut from = vec![];
        let mut to = vec![];
        for j in 0..2 {
            from.push(lit(s, i0 * 2 + j + 1));
            to.push(lit(s, i1 * 2 + j + 1));
            from.push(lit(s, i1 * 2 + j + 1));
            to.push(lit(s, i0 * 2 + j + 1));
        }
        s.add_symmetry(&from, &to);
    }

    #[test]
    fn test_pigeonhole_unsat_plain() {
        let mut s = mk();
        add_pigeonhole3x2(&mut s);
        assert_eq!(s.solve_limited(&[]), lbool::FALSE);
    }

    #[test]
    fn test_pigeonhole_unsat_with_symmetries() {
        let mut s = mk();
        add_pigeonhole3x2(&mut s);
        row_swap(&mut s, 0, 1);
        row_swap(&mut s, 1, 2);
        assert_eq!(s.solve_limited(&[]), lbool::FALSE);
    }

    #[test]
    fn test_symmetric_sat_picks_one() {
        let mut s = mk();
        add(&mut s, &[1, 2, 3]);
        add(&mut s, &[-1, -2]);
        add(&mut s, &[-1, -3]);
        add(&mut s, &[-2, -3]);
        let (l1, l2) = (lit(&mut s, 1), lit(&mut s, 2));
        s.add_symmetry(&[l1, l2], &[l2, l1]);
        assert_eq!(s.solve_limited(&[]), lbool::TRUE);
        let m = s.get_model();
        let count = (0..3).filter(|&i| m[i] == lbool::TRUE).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_symmetrical_unit_propagation() {
        let mut s = mk();
        for _ in 0..2 {
            s.new_var_default();
        }
        let l1 = Lit::new(Var::from_idx(0), true);
        let l2 = Lit::new(Var::from_idx(1), true);
        s.add_symmetry(&[l1], &[l2]);

        // a problem unit on the domain lets the generator derive its image
        s.v.unchecked_enqueue(l1, CRef::UNDEF);
        let confl = s.v.propagate(&mut s.learnts);
        assert!(confl.is_none());
        assert_eq!(s.v.value_lit(l2), lbool::TRUE);
        assert_eq!(s.num_sym_propagations(), 1);
        assert_eq!(s.learnts.len(), 1);
        let cr = s.learnts[0];
        {
            let c = s.v.ca.get_ref(cr);
            assert!(c.learnt() && c.symmetry() && c.first_symmetry());
            assert_eq!(c.lits(), &[l2, !l1][..]);
            assert!(c.compat().unwrap().is_empty() || c.compat().unwrap().contains(0));
        }
        assert_eq!(s.v.reason(l2.var()), cr);
        // the image is satisfied now, nothing further to derive
        assert!(s.v.symmetries[0]
            .next_to_propagate(&s.v.vars, &s.v.symmetry_units)
            .is_none());
    }

    #[test]
    fn test_symmetry_activity_roundtrip() {
        let mut s = mk();
        for _ in 0..2 {
            s.new_var_default();
        }
        let l1 = Lit::new(Var::from_idx(0), true);
        let l2 = Lit::new(Var::from_idx(1), true);
        s.add_symmetry(&[l1, l2], &[l2, l1]);
        assert!(s.v.symmetries[0].is_active());

        // a decision on the domain whose image is not implied deactivates
        s.v.vars.new_decision_level();
        s.v.unchecked_enqueue(!l1, CRef::UNDEF);
        assert!(!s.v.symmetries[0].is_active());

        // deciding the image restores weak activity
        s.v.vars.new_decision_level();
        s.v.unchecked_enqueue(!l2, CRef::UNDEF);
        assert!(s.v.symmetries[0].is_active());

        s.v.cancel_until(1);
        assert!(!s.v.symmetries[0].is_active());
        s.v.cancel_until(0);
        assert!(s.v.symmetries[0].is_active());
        assert!(!s.v.symmetries[0].is_permanently_inactive());
    }

    #[test]
    fn test_symmetry_broken_at_level_zero() {
        let mut s = mk();
        for _ in 0..2 {
            s.new_var_default();
        }
        let l1 = Lit::new(Var::from_idx(0), true);
        let l2 = Lit::new(Var::from_idx(1), true);
        s.add_symmetry(&[l1, l2], &[l2, l1]);
        add(&mut s, &[1]);
        add(&mut s, &[-2]);
        assert!(s.v.symmetries[0].is_permanently_inactive());
        assert!(!s.v.symmetries[0].is_active());
    }

    #[test]
    fn test_gc_stress_no_dangling_refs() {
        let mut opts = SolverOpts::default();
        opts.garbage_frac = 0.05;
        opts.restart_first = 10;
        let mut s = Solver::new(opts, Basic::new());

        // deterministic pseudo-random 3-SAT, 50 vars and 200 clauses
        let mut seed: u64 = 0xdeadbeef;
        let mut next = || {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (seed >> 33) as i32
        };
        for _ in 0..200 {
            let mut cl = [0i32; 3];
            for k in 0..3 {
                let v = next().rem_euclid(50) + 1;
                cl[k] = if next() % 2 == 0 { v } else { -v };
            }
            add(&mut s, &cl);
        }
        let ret = s.solve_limited(&[]);
        assert!(ret != lbool::UNDEF);
        check_clause_refs(&s);
    }

    #[test]
    fn test_trail_restored_after_backtrack() {
        let mut s = mk();
        add(&mut s, &[1, 2, 3]);
        add(&mut s, &[4, 5]);
        let n0 = s.v.vars.trail.len();
        let nl1 = lit(&mut s, -1);
        s.v.vars.new_decision_level();
        s.v.unchecked_enqueue(nl1, CRef::UNDEF);
        let confl = s.v.propagate(&mut s.learnts);
        assert!(confl.is_none());
        s.v.cancel_until(0);
        assert_eq!(s.v.vars.trail.len(), n0);
        assert_eq!(s.v.vars.trail_lim.len(), 0);
        for vi in 0..s.num_vars() {
            assert_eq!(s.v.value(Var::from_idx(vi)), lbool::UNDEF);
        }
    }

    #[test]
    fn test_luby() {
        assert_eq!(utils::luby(2.0, 0), 1.0);
        assert_eq!(utils::luby(2.0, 1), 1.0);
        assert_eq!(utils::luby(2.0, 2), 2.0);
        assert_eq!(utils::luby(2.0, 3), 1.0);
        assert_eq!(utils::luby(2.0, 6), 4.0);
        assert_eq!(utils::luby(2.0, 14), 8.0);
    }

    #[test]
    fn test_write_dimacs_unsat_state() {
        let mut s = mk();
        add(&mut s, &[1]);
        add(&mut s, &[-1]);
        let mut out = vec![];
        s.write_dimacs(&mut out, &[]).unwrap();
        assert_eq!(&out[..], b"p cnf 1 2\n1 0\n-1 0\n");
    }

    #[test]
    fn test_write_dimacs_live_clauses() {
        let mut s = mk();
        add(&mut s, &[1, 2]);
        let mut out = vec![];
        s.write_dimacs(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "p cnf 2 1\n1 2 0\n");
    }
}
