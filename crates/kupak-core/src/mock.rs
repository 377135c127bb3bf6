use crate::object::RenderedObject;
use crate::runner::{selector_matches, Runner, RunnerError};
use std::sync::Mutex;

/// In-memory cluster: objects are kept per namespace in creation order.
#[derive(Default)]
pub struct MockRunner {
    objects: Mutex<Vec<(String, RenderedObject)>>,
    fail_create: Option<String>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner whose every `create` fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            fail_create: Some(message.to_owned()),
        }
    }

    /// Place an object directly, bypassing `create`.
    pub fn insert(&self, namespace: &str, object: RenderedObject) -> Result<(), RunnerError> {
        self.lock()?.push((namespace.to_owned(), object));
        Ok(())
    }

    pub fn objects(&self, namespace: &str) -> Result<Vec<RenderedObject>, RunnerError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Vec<(String, RenderedObject)>>, RunnerError> {
        self.objects
            .lock()
            .map_err(|e| RunnerError::State(format!("mutex poisoned: {e}")))
    }
}

fn selected(object: &RenderedObject, selector: &str) -> bool {
    object
        .labels()
        .is_ok_and(|labels| selector_matches(selector, &labels))
}

impl Runner for MockRunner {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn create(&self, namespace: &str, manifest: &[u8]) -> Result<(), RunnerError> {
        if let Some(message) = &self.fail_create {
            return Err(RunnerError::CommandFailed {
                command: "mock create".to_owned(),
                status: "exit status: 1".to_owned(),
                stderr: message.clone(),
            });
        }
        let object =
            RenderedObject::from_bytes(manifest).map_err(|e| RunnerError::Decode(e.to_string()))?;
        self.insert(namespace, object)
    }

    fn list_by_selector(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<RenderedObject>, RunnerError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(ns, obj)| ns == namespace && selected(obj, selector))
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    fn delete_by_selector(&self, namespace: &str, selector: &str) -> Result<(), RunnerError> {
        self.lock()?
            .retain(|(ns, obj)| !(ns == namespace && selected(obj, selector)));
        Ok(())
    }
}
