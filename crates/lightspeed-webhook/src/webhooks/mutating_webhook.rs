use std::{marker::PhantomData, sync::Arc};

use axum::{Json, Router, body::Bytes, routing::post};
use kube::{
    Resource,
    core::{
        DynamicObject,
        admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, SerializePatchError},
    },
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::{ResultExt, Snafu};

use super::{Webhook, patch::defaulting_patch};
use crate::defaulter::{CustomDefaulter, DefaultingContext};

#[derive(Debug, Snafu)]
pub enum MutatingWebhookError {
    #[snafu(display("failed to serialize object to JSON"))]
    SerializeObject { source: serde_json::Error },

    #[snafu(display("failed to decode the submitted object"))]
    DecodeObject { source: serde_json::Error },

    #[snafu(display("failed to attach JSON patch to admission response"))]
    SerializePatch { source: SerializePatchError },
}

/// Returns the HTTP path under which the mutating webhook for the resource `K` is served.
///
/// The path is derived from the group, version and kind of the resource, for example
/// `/mutate-ols-openshift-io-v1alpha1-olsconfig`. Dots in the group are replaced with dashes.
pub fn mutating_http_path<K>() -> String
where
    K: Resource<DynamicType = ()>,
{
    let group = K::group(&()).replace('.', "-");
    let version = K::version(&());
    let kind = K::kind(&()).to_lowercase();

    format!("/mutate-{group}-{version}-{kind}")
}

/// Mutating webhook, which lets a [`CustomDefaulter`] fill in defaults on objects of the resource
/// type `K` before they are persisted.
///
/// The webhook decodes `admission.k8s.io/v1` `AdmissionReview`s, hands a typed copy of the
/// submitted object to the defaulter and answers with a JSON patch describing the changes. The
/// patch is relative to the object as submitted, not to its typed representation. Objects which
/// are not changed by the defaulter are admitted without a patch.
///
/// As the webhook is typed with the Resource type `K`, it can only handle a single resource
/// kind. Use multiple [`MutatingWebhook`]s if you need to default multiple resource kinds.
pub struct MutatingWebhook<K, D> {
    http_path: String,
    defaulter: Arc<D>,

    /// This field is not needed, it only tracks the type of the Kubernetes resource we are mutating
    _resource: PhantomData<fn() -> K>,
}

impl<K, D> MutatingWebhook<K, D>
where
    K: Resource<DynamicType = ()>,
{
    /// Creates a webhook served under the path returned by [`mutating_http_path`].
    pub fn new(defaulter: D) -> Self {
        Self::with_http_path(mutating_http_path::<K>(), defaulter)
    }
}

impl<K, D> MutatingWebhook<K, D> {
    pub fn with_http_path(http_path: impl Into<String>, defaulter: D) -> Self {
        Self {
            http_path: http_path.into(),
            defaulter: Arc::new(defaulter),
            _resource: PhantomData,
        }
    }

    pub fn http_path(&self) -> &str {
        &self.http_path
    }
}

impl<K, D> Webhook for MutatingWebhook<K, D>
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Serialize + Clone + Send + Sync + 'static,
    D: CustomDefaulter,
{
    fn register_routes(&self, router: Router) -> Router {
        let defaulter = self.defaulter.clone();
        let handler_fn = |body: Bytes| async move { Json(review::<K, D>(&defaulter, &body)) };

        let route = self.http_path();
        tracing::debug!(route, "registering route for mutating webhook");
        router.route(route, post(handler_fn))
    }
}

/// Decodes the raw `AdmissionReview` and produces the review sent back to the API server.
///
/// Malformed reviews are answered with an invalid (denied) response, so the API server always
/// receives a well-formed review.
fn review<K, D>(defaulter: &D, body: &[u8]) -> AdmissionReview<DynamicObject>
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Serialize + Clone + 'static,
    D: CustomDefaulter,
{
    // The object is kept untyped, the patch must apply to it exactly as it was submitted.
    let review: AdmissionReview<DynamicObject> = match serde_json::from_slice(body) {
        Ok(review) => review,
        Err(err) => {
            tracing::warn!(%err, "failed to deserialize admission review");
            return AdmissionResponse::invalid(format!("failed to deserialize review: {err}"))
                .into_review();
        }
    };

    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(%err, "failed to convert admission review to request");
            return AdmissionResponse::invalid(format!("failed to convert to request: {err}"))
                .into_review();
        }
    };

    mutate::<K, D>(defaulter, &request).into_review()
}

fn mutate<K, D>(defaulter: &D, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Serialize + Clone + 'static,
    D: CustomDefaulter,
{
    let context = DefaultingContext::from(request);

    let Some(object) = &request.object else {
        tracing::debug!(
            admission.uid = %context.uid,
            admission.operation = %context.operation,
            "admission request carries no object, allowing unchanged"
        );
        return AdmissionResponse::from(request);
    };

    let (submitted, original) = match decode_object::<K>(object) {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::warn!(
                admission.uid = %context.uid,
                error = &err as &dyn std::error::Error,
                "failed to decode submitted object, denying admission"
            );
            return AdmissionResponse::from(request).deny(err.to_string());
        }
    };

    let mut defaulted = original.clone();
    if let Err(err) = defaulter.default(&context, &mut defaulted) {
        tracing::warn!(
            admission.uid = %context.uid,
            error = &err as &dyn std::error::Error,
            "failed to default object, denying admission"
        );
        return AdmissionResponse::from(request).deny(err.to_string());
    }

    match patched_response(request, &submitted, &original, &defaulted) {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(
                admission.uid = %context.uid,
                error = &err as &dyn std::error::Error,
                "failed to compute JSON patch"
            );
            AdmissionResponse::from(request).deny(err.to_string())
        }
    }
}

/// Returns the submitted object as JSON together with its typed representation.
fn decode_object<K>(object: &DynamicObject) -> Result<(Value, K), MutatingWebhookError>
where
    K: DeserializeOwned,
{
    let submitted = serde_json::to_value(object).context(SerializeObjectSnafu)?;
    let typed = serde_json::from_value(submitted.clone()).context(DecodeObjectSnafu)?;

    Ok((submitted, typed))
}

/// Builds the allowing response, with a JSON patch attached only if `defaulted` differs from
/// `original`.
fn patched_response<K>(
    request: &AdmissionRequest<DynamicObject>,
    submitted: &Value,
    original: &K,
    defaulted: &K,
) -> Result<AdmissionResponse, MutatingWebhookError>
where
    K: Serialize,
{
    let original = serde_json::to_value(original).context(SerializeObjectSnafu)?;
    let defaulted = serde_json::to_value(defaulted).context(SerializeObjectSnafu)?;
    let patch = defaulting_patch(submitted, &original, &defaulted);
    let response = AdmissionResponse::from(request);

    if patch.0.is_empty() {
        tracing::debug!(admission.uid = %request.uid, "object unchanged, no patch needed");
        return Ok(response);
    }

    tracing::debug!(
        admission.uid = %request.uid,
        patch.operations = patch.0.len(),
        "attaching JSON patch to admission response"
    );
    response.with_patch(patch).context(SerializePatchSnafu)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use base64::{Engine, prelude::BASE64_STANDARD};
    use k8s_openapi::{
        api::core::v1::{ConfigMap, Secret},
        apimachinery::pkg::apis::meta::v1::ObjectMeta,
    };
    use rstest::rstest;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::defaulter::AdmissionObject;

    #[derive(Debug, Snafu)]
    enum LabelDefaulterError {
        #[snafu(display("expected a ConfigMap"))]
        UnexpectedObjectType,

        #[snafu(display("the ConfigMap is marked as rejected"))]
        Rejected,
    }

    /// Adds the `defaulted: "true"` label and rejects ConfigMaps containing a `reject` key.
    struct LabelDefaulter;

    impl CustomDefaulter for LabelDefaulter {
        type Error = LabelDefaulterError;

        fn default(
            &self,
            _ctx: &DefaultingContext,
            object: &mut dyn AdmissionObject,
        ) -> Result<(), Self::Error> {
            let config_map = object
                .as_any_mut()
                .downcast_mut::<ConfigMap>()
                .ok_or(LabelDefaulterError::UnexpectedObjectType)?;

            if config_map
                .data
                .as_ref()
                .is_some_and(|data| data.contains_key("reject"))
            {
                return Err(LabelDefaulterError::Rejected);
            }

            config_map
                .metadata
                .labels
                .get_or_insert_with(BTreeMap::new)
                .insert("defaulted".to_owned(), "true".to_owned());

            Ok(())
        }
    }

    fn config_map(labels: Option<BTreeMap<String, String>>, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("demo".to_owned()),
                namespace: Some("default".to_owned()),
                labels,
                ..Default::default()
            },
            data: (!data.is_empty()).then(|| {
                data.iter()
                    .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                    .collect()
            }),
            ..Default::default()
        }
    }

    fn admission_review(operation: &str, object: Option<&ConfigMap>) -> Value {
        json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
                "kind": { "group": "", "version": "v1", "kind": "ConfigMap" },
                "resource": { "group": "", "version": "v1", "resource": "configmaps" },
                "name": "demo",
                "namespace": "default",
                "operation": operation,
                "userInfo": { "username": "admin" },
                "object": object,
                "dryRun": false
            }
        })
    }

    async fn call_webhook(body: Vec<u8>) -> Value {
        let webhook = MutatingWebhook::<ConfigMap, _>::new(LabelDefaulter);
        let router = webhook.register_routes(Router::new());

        let request = Request::builder()
            .method("POST")
            .uri("/mutate--v1-configmap")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("failed to build request");

        let response = router
            .oneshot(request)
            .await
            .expect("router must respond");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        serde_json::from_slice(&bytes).expect("response must be JSON")
    }

    #[test]
    fn http_path_from_resource() {
        assert_eq!(mutating_http_path::<ConfigMap>(), "/mutate--v1-configmap");
        assert_eq!(mutating_http_path::<Secret>(), "/mutate--v1-secret");
    }

    /// Decodes the base64 encoded patch of the response and applies it to `submitted`.
    fn apply_response_patch(response: &Value, submitted: &Value) -> Value {
        let encoded = response["patch"].as_str().expect("response must carry a patch");
        let decoded = BASE64_STANDARD.decode(encoded).expect("patch must be base64");
        let patch: json_patch::Patch = serde_json::from_slice(&decoded).expect("patch must be JSON");

        let mut patched = submitted.clone();
        json_patch::patch(&mut patched, &patch).expect("patch must apply to the submitted object");
        patched
    }

    #[tokio::test]
    async fn defaulted_object_is_patched() {
        let object = config_map(None, &[]);
        let review = admission_review("CREATE", Some(&object));
        let review = call_webhook(serde_json::to_vec(&review).expect("review must serialize")).await;

        let response = &review["response"];
        assert_eq!(response["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
        assert_eq!(response["allowed"], true);
        assert_eq!(response["patchType"], "JSONPatch");

        let submitted = serde_json::to_value(&object).expect("object must serialize");
        let patched = apply_response_patch(response, &submitted);
        assert_eq!(patched["metadata"]["labels"], json!({ "defaulted": "true" }));
    }

    #[tokio::test]
    async fn patch_keeps_fields_unknown_to_the_resource() {
        // Neither `binaryData: null` nor `futureField` survive a typed round trip.
        let submitted = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "demo", "namespace": "default" },
            "binaryData": null,
            "futureField": { "enabled": true }
        });
        let mut review = admission_review("CREATE", None);
        review["request"]["object"] = submitted.clone();
        let review = call_webhook(serde_json::to_vec(&review).expect("review must serialize")).await;

        let patched = apply_response_patch(&review["response"], &submitted);
        assert_eq!(
            patched,
            json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {
                    "name": "demo",
                    "namespace": "default",
                    "labels": { "defaulted": "true" }
                },
                "binaryData": null,
                "futureField": { "enabled": true }
            })
        );
    }

    #[tokio::test]
    async fn undecodable_object_is_denied() {
        let mut review = admission_review("CREATE", None);
        review["request"]["object"] = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "demo" },
            "data": { "key": 42 }
        });
        let review = call_webhook(serde_json::to_vec(&review).expect("review must serialize")).await;

        let response = &review["response"];
        assert_eq!(response["allowed"], false);
        assert_eq!(response["status"]["message"], "failed to decode the submitted object");
    }

    #[tokio::test]
    async fn unchanged_object_is_not_patched() {
        let labels = BTreeMap::from([("defaulted".to_owned(), "true".to_owned())]);
        let review = admission_review("UPDATE", Some(&config_map(Some(labels), &[])));
        let review = call_webhook(serde_json::to_vec(&review).expect("review must serialize")).await;

        let response = &review["response"];
        assert_eq!(response["allowed"], true);
        assert!(response.get("patch").is_none());
    }

    #[tokio::test]
    async fn defaulter_error_denies_admission() {
        let review = admission_review("CREATE", Some(&config_map(None, &[("reject", "yes")])));
        let review = call_webhook(serde_json::to_vec(&review).expect("review must serialize")).await;

        let response = &review["response"];
        assert_eq!(response["allowed"], false);
        assert_eq!(
            response["status"]["message"],
            "the ConfigMap is marked as rejected"
        );
    }

    #[tokio::test]
    async fn request_without_object_is_allowed() {
        let review = admission_review("DELETE", None);
        let review = call_webhook(serde_json::to_vec(&review).expect("review must serialize")).await;

        let response = &review["response"];
        assert_eq!(response["allowed"], true);
        assert!(response.get("patch").is_none());
    }

    #[rstest]
    #[case::not_json(b"this is not JSON".to_vec())]
    #[case::missing_request(br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview"}"#.to_vec())]
    #[tokio::test]
    async fn malformed_review_is_invalid(#[case] body: Vec<u8>) {
        let review = call_webhook(body).await;

        assert_eq!(review["response"]["allowed"], false);
    }
}
