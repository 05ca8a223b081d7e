use nalgebra::DMatrix;

/// Number of states referenced by a set of discrete trajectories (largest label + 1).
pub fn n_states(dtrajs: &[Vec<usize>]) -> usize {
    dtrajs
        .iter()
        .flat_map(|dtraj| dtraj.iter())
        .max()
        .map_or(0, |&max| max + 1)
}

/// Sliding-window transition counts at `lag`: every pair `(s_t, s_{t+lag})` within a
/// trajectory contributes one count. Labels `>= nstates` are ignored.
pub fn count_matrix(dtrajs: &[Vec<usize>], lag: usize, nstates: usize) -> DMatrix<f64> {
    let mut counts = DMatrix::zeros(nstates, nstates);
    for dtraj in dtrajs.iter().filter(|d| d.len() > lag) {
        for (&from, &to) in dtraj.iter().zip(&dtraj[lag..]) {
            if from < nstates && to < nstates {
                counts[(from, to)] += 1.0;
            }
        }
    }
    counts
}

/// Largest strongly connected set of the count graph, as sorted state indices.
///
/// States `i` and `j` are connected when counts exist in both directions along some
/// path. Among sets of equal size the one containing the smallest state wins.
pub fn largest_connected_set(counts: &DMatrix<f64>) -> Vec<usize> {
    strongly_connected_sets(counts)
        .into_iter()
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b[0].cmp(&a[0])))
        .unwrap_or_default()
}

/// All strongly connected sets, each sorted, found with Tarjan's algorithm.
pub fn strongly_connected_sets(counts: &DMatrix<f64>) -> Vec<Vec<usize>> {
    let n = counts.nrows();
    let successors: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| counts[(i, j)] > 0.0).collect())
        .collect();

    let mut tarjan = Tarjan {
        successors: &successors,
        index: vec![None; n],
        low_link: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };
    for state in 0..n {
        if tarjan.index[state].is_none() {
            tarjan.visit(state);
        }
    }
    tarjan.components
}

struct Tarjan<'a> {
    successors: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    low_link: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.low_link[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let successors = self.successors;
        for &w in &successors[v] {
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.low_link[v] = self.low_link[v].min(self.low_link[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.low_link[v] = self.low_link[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.low_link[v]) == self.index[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            component.sort_unstable();
            self.components.push(component);
        }
    }
}

/// Submatrix of `matrix` on the rows and columns listed in `states`.
pub fn restrict(matrix: &DMatrix<f64>, states: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(states.len(), states.len(), |r, c| {
        matrix[(states[r], states[c])]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_use_sliding_window() {
        let dtrajs = vec![vec![0, 1, 0, 1, 1], vec![2]];
        let counts = count_matrix(&dtrajs, 2, n_states(&dtrajs));
        assert_eq!(counts.shape(), (3, 3));
        assert_eq!(counts[(0, 0)], 1.0);
        assert_eq!(counts[(1, 1)], 1.0);
        assert_eq!(counts[(0, 1)], 1.0);
        assert_eq!(counts.sum(), 3.0);
    }

    #[test]
    fn n_states_of_empty_input_is_zero() {
        assert_eq!(n_states(&[]), 0);
        assert_eq!(n_states(&[vec![], vec![4, 1]]), 5);
    }

    #[test]
    fn largest_set_drops_transient_states() {
        // 0 -> 1 <-> 2 <-> 3, and 4 only reached from 3.
        let dtrajs = vec![vec![0, 1, 2, 3, 2, 1, 2, 3, 4]];
        let counts = count_matrix(&dtrajs, 1, 5);
        assert_eq!(largest_connected_set(&counts), vec![1, 2, 3]);
    }

    #[test]
    fn ties_prefer_the_smallest_state() {
        let dtrajs = vec![vec![3, 4, 3, 4], vec![0, 1, 0, 1]];
        let counts = count_matrix(&dtrajs, 1, 5);
        assert_eq!(largest_connected_set(&counts), vec![0, 1]);
    }

    #[test]
    fn restrict_keeps_the_listed_states() {
        let matrix = DMatrix::from_fn(3, 3, |r, c| (10 * r + c) as f64);
        let sub = restrict(&matrix, &[0, 2]);
        assert_eq!(sub, DMatrix::from_row_slice(2, 2, &[0.0, 2.0, 20.0, 22.0]));
    }
}
