//! End-to-end tests on DIMACS inputs.
use kestrel::{Lit, Solver};

fn solve_dimacs(input: &str) -> (Option<bool>, Option<Vec<Lit>>) {
    let mut solver = Solver::new();
    solver.add_dimacs_cnf(input.as_bytes()).unwrap();
    let result = solver.solve();
    let model = solver.model();
    (result, model)
}

fn check_model(input: &str, model: &[Lit]) {
    let formula = kestrel_dimacs::DimacsParser::parse(input.as_bytes()).unwrap();
    for clause in formula.iter() {
        assert!(
            clause.iter().any(|lit| model.contains(lit)),
            "clause {:?} not satisfied by model {:?}",
            clause,
            model
        );
    }
}

#[test]
fn empty_formula() {
    let (result, model) = solve_dimacs("p cnf 0 0\n");
    assert_eq!(result, Some(true));
    assert_eq!(model, Some(vec![]));
}

#[test]
fn contradicting_units() {
    let (result, _) = solve_dimacs("p cnf 1 2\n1 0\n-1 0\n");
    assert_eq!(result, Some(false));
}

#[test]
fn three_clauses_sat() {
    let input = "p cnf 3 3\n1 2 0\n2 3 0\n-1 -3 0\n";
    let (result, model) = solve_dimacs(input);
    assert_eq!(result, Some(true));
    check_model(input, &model.unwrap());
}

#[test]
fn pigeon_hole_4_in_3() {
    // Four pigeons into three holes: variable 3*(p-1)+h is pigeon p in
    // hole h.
    let mut input = String::from("p cnf 12 22\n");
    for pigeon in 0..4 {
        for hole in 0..3 {
            input.push_str(&format!("{} ", pigeon * 3 + hole + 1));
        }
        input.push_str("0\n");
    }
    for hole in 0..3 {
        for pigeon_a in 0..4 {
            for pigeon_b in 0..pigeon_a {
                input.push_str(&format!(
                    "-{} -{} 0\n",
                    pigeon_a * 3 + hole + 1,
                    pigeon_b * 3 + hole + 1
                ));
            }
        }
    }

    let (result, _) = solve_dimacs(&input);
    assert_eq!(result, Some(false));
}

#[test]
fn pigeon_hole_4_in_3_self_checked() {
    let mut input = String::from("p cnf 12 22\n");
    for pigeon in 0..4 {
        for hole in 0..3 {
            input.push_str(&format!("{} ", pigeon * 3 + hole + 1));
        }
        input.push_str("0\n");
    }
    for hole in 0..3 {
        for pigeon_a in 0..4 {
            for pigeon_b in 0..pigeon_a {
                input.push_str(&format!(
                    "-{} -{} 0\n",
                    pigeon_a * 3 + hole + 1,
                    pigeon_b * 3 + hole + 1
                ));
            }
        }
    }

    let mut solver = Solver::new();
    solver.enable_self_checking();
    solver.add_dimacs_cnf(input.as_bytes()).unwrap();
    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn two_by_two_cover() {
    let mut solver = Solver::new();

    solver.add_dimacs_cnf(b"p cnf 2 2\n1 2 0\n-1 2 0\n" as &[u8]).unwrap();
    assert_eq!(solver.solve(), Some(true));
    // Propagation alone derives variable 2.
    assert_eq!(solver.value(Lit::from_dimacs(2)), Some(true));

    solver
        .add_dimacs_cnf(b"1 -2 0\n-1 -2 0\n" as &[u8])
        .unwrap();
    assert_eq!(solver.solve(), Some(false));
}

#[test]
fn random_3sat_at_ratio_4() {
    use rand::{Rng, SeedableRng};

    let mut rng = rand::rngs::SmallRng::seed_from_u64(42);

    let vars = 40;
    let clauses = 160;

    let mut input = format!("p cnf {} {}\n", vars, clauses);
    for _ in 0..clauses {
        let mut clause = vec![];
        while clause.len() < 3 {
            let var = rng.gen_range(1, vars + 1) as isize;
            if clause.iter().any(|&(v, _)| v == var) {
                continue;
            }
            clause.push((var, rng.gen::<bool>()));
        }
        for (var, positive) in clause {
            input.push_str(&format!("{} ", if positive { var } else { -var }));
        }
        input.push_str("0\n");
    }

    // Either result is fine, but self checking must accept the whole run.
    let mut solver = Solver::new();
    solver.enable_self_checking();
    solver.add_dimacs_cnf(input.as_bytes()).unwrap();

    let result = solver.solve();
    assert!(result.is_some());

    if result == Some(true) {
        check_model(&input, &solver.model().unwrap());
    }
}

#[test]
fn solve_is_idempotent() {
    let input = "p cnf 3 3\n1 2 0\n2 3 0\n-1 -3 0\n";

    let mut solver = Solver::new();
    solver.add_dimacs_cnf(input.as_bytes()).unwrap();

    let first = solver.solve();
    let second = solver.solve();
    assert_eq!(first, Some(true));
    assert_eq!(first, second);

    check_model(input, &solver.model().unwrap());
}

#[test]
fn inprocessing_can_be_disabled() {
    let mut input = String::from("p cnf 12 22\n");
    for pigeon in 0..4 {
        for hole in 0..3 {
            input.push_str(&format!("{} ", pigeon * 3 + hole + 1));
        }
        input.push_str("0\n");
    }
    for hole in 0..3 {
        for pigeon_a in 0..4 {
            for pigeon_b in 0..pigeon_a {
                input.push_str(&format!(
                    "-{} -{} 0\n",
                    pigeon_a * 3 + hole + 1,
                    pigeon_b * 3 + hole + 1
                ));
            }
        }
    }

    let mut solver = Solver::new();
    for &option in &[
        "eliminate",
        "probe",
        "vivify",
        "ternary",
        "transitive",
        "subsume",
        "autarky",
        "walk",
        "chrono",
    ] {
        solver.set_option(option, 0).unwrap();
    }
    solver.add_dimacs_cnf(input.as_bytes()).unwrap();
    assert_eq!(solver.solve(), Some(false));
}
