/*****************************************************************************************[order.rs]
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

//! Optional hook towards an external symmetry-order engine.
//!
//! Such an engine maintains a total order on literals and emits
//! symmetry-breaking clauses (units before search, ESBP clauses during
//! search). The solver mirrors its trail into the hook and collects the
//! clauses it offers; it never depends on the hook being present.

use crate::clause::Lit;

/// How the external engine picks its literal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMode {
    Auto,
    Custom,
}

/// Preferred truth value along the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    TrueLessFalse,
    FalseLessTrue,
}

/// The kinds of clauses an order engine can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectKind {
    /// Unit clauses, available before search starts.
    Units,
    /// Effective symmetry-breaking predicates, fully false under the
    /// current assignment.
    Esbp,
    /// Forcing variant of ESBP clauses.
    EsbpForcing,
}

/// Interface of an external symmetry-order engine.
pub trait SymmetryOrder {
    /// Configure the engine; called once when search starts.
    fn enable(&mut self, order: OrderMode, value: ValueMode);

    /// A literal was appended to the trail.
    fn update_notify(&mut self, l: Lit);

    /// A literal was removed from the trail.
    fn update_cancel(&mut self, l: Lit);

    /// Is a clause of the given kind available? `l` restricts the query to
    /// clauses triggered by that literal.
    fn has_clause_to_inject(&self, kind: InjectKind, l: Option<Lit>) -> bool;

    /// Retrieve such a clause. Must only be called after a successful
    /// [`SymmetryOrder::has_clause_to_inject`] with the same arguments.
    fn clause_to_inject(&mut self, kind: InjectKind, l: Option<Lit>) -> Vec<Lit>;
}

/// Hook that never injects anything.
pub struct NoOrder;

impl SymmetryOrder for NoOrder {
    fn enable(&mut self, _order: OrderMode, _value: ValueMode) {}
    fn update_notify(&mut self, _l: Lit) {}
    fn update_cancel(&mut self, _l: Lit) {}
    fn has_clause_to_inject(&self, _kind: InjectKind, _l: Option<Lit>) -> bool {
        false
    }
    fn clause_to_inject(&mut self, _kind: InjectKind, _l: Option<Lit>) -> Vec<Lit> {
        unreachable!()
    }
}
