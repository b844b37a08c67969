mod util;

use certrotor::factory::ServerKeyPairRequest;
use openssl::nid::Nid;
use openssl::x509::X509;

fn common_name(name: &openssl::x509::X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .unwrap()
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}

#[test]
fn test_openssl_crate_validate_server_cert() {
    let factory = util::factory();
    let ca = util::generate_ca_cert();
    let request = ServerKeyPairRequest::builder()
        .common_name("certrotor-api.ops.pod.cluster.local")
        .service_name("certrotor-api")
        .namespace("ops")
        .domain("cluster.local")
        .build();
    let server = factory
        .new_server_key_pair(&ca, &request, util::HOUR)
        .unwrap();

    let ca_x509 = X509::from_pem(ca.cert.to_pem().unwrap().as_bytes()).expect("Failed to parse CA PEM");
    let x509 = X509::from_pem(server.cert.to_pem().unwrap().as_bytes())
        .expect("Failed to parse PEM");

    assert_eq!(common_name(x509.subject_name()), "certrotor-api.ops.pod.cluster.local");
    assert_eq!(common_name(x509.issuer_name()), "certrotor.io");
    assert_eq!(x509.version(), 2, "X509 version should be 3 (0-based index)");
    assert_eq!(
        x509.signature_algorithm().object().nid(),
        Nid::SHA256WITHRSAENCRYPTION
    );

    let dns_names: Vec<String> = x509
        .subject_alt_names()
        .expect("missing subject alternative names")
        .iter()
        .filter_map(|name| name.dnsname().map(str::to_string))
        .collect();
    assert_eq!(
        dns_names,
        vec![
            "certrotor-api",
            "certrotor-api.ops",
            "certrotor-api.ops.svc",
            "certrotor-api.ops.svc.cluster.local",
        ]
    );

    let ca_public_key = ca_x509.public_key().unwrap();
    assert!(x509.verify(&ca_public_key).unwrap(), "signature does not verify against the CA");
    assert!(ca_x509.verify(&ca_public_key).unwrap(), "CA is not self-signed");
}

#[test]
fn test_openssl_accepts_pkcs1_key() {
    let ca = util::generate_ca_cert();
    let key_pem = certrotor::codec::encode_key(&ca.key).unwrap();

    let rsa = openssl::rsa::Rsa::private_key_from_pem(&key_pem).expect("Failed to parse key");
    let x509 = X509::from_pem(ca.cert.to_pem().unwrap().as_bytes()).unwrap();
    let public = x509.public_key().unwrap().rsa().unwrap();

    assert_eq!(rsa.n(), public.n());
    assert_eq!(rsa.size() * 8, util::TEST_KEY_BITS as u32);
}

#[test]
fn test_openssl_reads_whole_bundle() {
    let first = util::generate_ca_cert();
    let second = util::generate_ca_cert();
    let bundle = certrotor::codec::encode_cert_chain([&first.cert, &second.cert]).unwrap();

    let stack = X509::stack_from_pem(&bundle).expect("Failed to parse bundle");
    assert_eq!(stack.len(), 2);
    assert_eq!(stack[0].to_der().unwrap(), first.cert.to_der().unwrap());
}
