//! Property tests for release ordering and default application.

use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use warden_core::{
    Access, CallArgs, ExitOutcome, Mapping, MaybeAsync, Provided, RequestAccessor, Resolved,
    ScopedResource, WardenError, WardenResult,
};
use warden_field::{Annotation, Field, ModelRegistry};
use warden_param::{CompileOptions, Dependency, Engine, EngineOptions, RuleCompiler, Signature};

struct Empty;

impl RequestAccessor for Empty {
    fn query(&self) -> WardenResult<Mapping> {
        Ok(Mapping::new())
    }
    fn header(&self) -> WardenResult<Mapping> {
        Ok(Mapping::new())
    }
    fn cookie(&self) -> WardenResult<Mapping> {
        Ok(Mapping::new())
    }
    fn path_params(&self) -> WardenResult<Mapping> {
        Ok(Mapping::new())
    }
    fn body(&self) -> Access<'_, Mapping> {
        MaybeAsync::ready(Ok(Mapping::new()))
    }
}

fn chain(depth: usize, log: &Arc<Mutex<Vec<(bool, usize)>>>) -> Dependency {
    let mut dependency: Option<Dependency> = None;
    for level in 0..depth {
        let log = Arc::clone(log);
        let mut next = Dependency::function(format!("level_{level}"), move |_| {
            let enter_log = Arc::clone(&log);
            let exit_log = Arc::clone(&log);
            Ok(Provided::resource(ScopedResource::new(
                move || {
                    enter_log.lock().push((true, level));
                    Ok(Resolved::json(level))
                },
                move |_: &ExitOutcome| {
                    exit_log.lock().push((false, level));
                    Ok(())
                },
            )))
        });
        if let Some(inner) = dependency.take() {
            next = next.param("inner", Annotation::Integer, inner);
        }
        dependency = Some(next.returns(Annotation::Integer));
    }
    dependency.unwrap()
}

fn compile(signature: &Signature) -> Engine {
    let rules = RuleCompiler::new(&ModelRegistry::new(), CompileOptions::default())
        .compile_signature(signature)
        .unwrap();
    Engine::new(rules, EngineOptions::default()).unwrap()
}

proptest! {
    #[test]
    fn test_release_order_reverses_acquisition(depth in 1_usize..8, fail in any::<bool>()) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let engine = compile(&Signature::new("demo").param("top", Annotation::Integer, chain(depth, &log)));

        let result = tokio_test::block_on(engine.run(&Empty, |_args: CallArgs| async move {
            if fail {
                Err(WardenError::handler(anyhow::anyhow!("handler failed")))
            } else {
                Ok(())
            }
        }));
        prop_assert_eq!(result.is_err(), fail);

        let log = log.lock();
        let acquired: Vec<usize> = log.iter().filter(|(enter, _)| *enter).map(|(_, l)| *l).collect();
        let released: Vec<usize> = log.iter().filter(|(enter, _)| !*enter).map(|(_, l)| *l).collect();
        prop_assert_eq!(acquired.len(), depth);
        prop_assert_eq!(released, acquired.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_absent_values_take_their_default(default in any::<i64>()) {
        let engine = compile(
            &Signature::new("demo").param("n", Annotation::Integer, Field::query().default(default)),
        );
        let value: i64 = engine.run_sync(&Empty, |args| args.value("n")).unwrap();
        prop_assert_eq!(value, default);
    }
}
