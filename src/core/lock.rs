use std::sync::{Mutex, MutexGuard};

fn log_poisoned(lock_type: &str, context: &str) {
    log::error!("{} lock poisoned in {}", lock_type, context);
}

/// Locks `mutex`, recovering the guard if a previous holder panicked.
pub fn lock_mutex<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log_poisoned("Mutex", context);
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn recovers_poisoned_mutex() {
        let shared = Arc::new(Mutex::new(vec![1, 2, 3]));
        let cloned = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison it");
        })
        .join();

        assert!(shared.is_poisoned());
        let guard = lock_mutex(&shared, "test");
        assert_eq!(*guard, vec![1, 2, 3]);
    }
}
