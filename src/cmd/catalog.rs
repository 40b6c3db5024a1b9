/*!
Resource catalog for the command tree.

Each `Resource` becomes a subcommand group; each of its `verbs` becomes a
leaf command under that group; `children` nest below it. The resource's
`id_flag` is declared on the group as an inherited flag, so every verb and
every descendant resource sees it:

  cloudctl datacenter server nic get --datacenter-id A --server-id B --nic-id C
           \________/ \____/ \_/ \_/
            resource  child  child verb

Routes are templates; `{flag}` segments are filled from flag values.
Resources without a `collection` are pure namespaces (e.g. `dns`).
*/

/// Leaf verbs a resource can support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Verb {
    pub const ALL: &'static [Verb] = &[
        Verb::List,
        Verb::Get,
        Verb::Create,
        Verb::Update,
        Verb::Delete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Verb::List => "list",
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name() == name)
    }

    /// Verbs that start asynchronous work on the API side.
    pub fn is_mutating(self) -> bool {
        matches!(self, Verb::Create | Verb::Update | Verb::Delete)
    }

    pub fn about(self, noun: &str) -> String {
        match self {
            Verb::List => format!("List {noun} resources"),
            Verb::Get => format!("Get a {noun}"),
            Verb::Create => format!("Create a {noun}"),
            Verb::Update => format!("Update a {noun}"),
            Verb::Delete => format!("Delete a {noun}"),
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            Verb::List => "listed",
            Verb::Get => "retrieved",
            Verb::Create => "created",
            Verb::Update => "updated",
            Verb::Delete => "deleted",
        }
    }
}

/// Request body field settable through a flag on create/update.
#[derive(Debug)]
pub struct Field {
    pub flag: &'static str,
    /// Key inside `properties`.
    pub key: &'static str,
    /// Coercion hint: string | integer | number | boolean | array.
    pub kind: &'static str,
    /// Required on create.
    pub required: bool,
    pub help: &'static str,
}

/// How an update is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStyle {
    /// `PATCH` with the bare properties object.
    PatchProperties,
    /// `PATCH` with `{"properties": {...}}`.
    PatchEnvelope,
    /// `PUT` with `{"properties": {...}}`.
    PutEnvelope,
}

#[derive(Debug)]
pub struct Resource {
    pub name: &'static str,
    pub about: &'static str,
    pub id_flag: Option<&'static str>,
    pub collection: Option<&'static str>,
    pub verbs: &'static [Verb],
    pub fields: &'static [Field],
    pub update: UpdateStyle,
    pub children: &'static [Resource],
}

impl Resource {
    pub fn supports(&self, verb: Verb) -> bool {
        self.collection.is_some() && self.verbs.contains(&verb)
    }

    /// Route template of a single item: `collection/{id_flag}`.
    pub fn item_route(&self) -> Option<String> {
        Some(format!("{}/{{{}}}", self.collection?, self.id_flag?))
    }

    pub fn child(&self, name: &str) -> Option<&Resource> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Walk `names` down the resource tree.
pub fn find<'a>(resources: &'a [Resource], names: &[String]) -> Option<&'a Resource> {
    let (first, rest) = names.split_first()?;
    let mut current = resources.iter().find(|r| r.name == first)?;
    for name in rest {
        current = current.child(name)?;
    }
    Some(current)
}

/* -------------------------------------------------------------------------- */
/* Catalog                                                                    */
/* -------------------------------------------------------------------------- */

const fn field(
    flag: &'static str,
    key: &'static str,
    kind: &'static str,
    required: bool,
    help: &'static str,
) -> Field {
    Field {
        flag,
        key,
        kind,
        required,
        help,
    }
}

const fn namespace(name: &'static str, about: &'static str, children: &'static [Resource]) -> Resource {
    Resource {
        name,
        about,
        id_flag: None,
        collection: None,
        verbs: &[],
        fields: &[],
        update: UpdateStyle::PatchProperties,
        children,
    }
}

const DNS: &[Resource] = &[Resource {
    name: "zone",
    about: "DNS zones",
    id_flag: Some("zone-id"),
    collection: Some("/dns/v1/zones"),
    verbs: Verb::ALL,
    fields: &[
        field("name", "zoneName", "string", true, "Zone name, e.g. example.com"),
        field("description", "description", "string", false, "Free-form description"),
        field("enabled", "enabled", "boolean", false, "Serve the zone"),
    ],
    update: UpdateStyle::PutEnvelope,
    children: &[Resource {
        name: "record",
        about: "Records inside a DNS zone",
        id_flag: Some("record-id"),
        collection: Some("/dns/v1/zones/{zone-id}/records"),
        verbs: Verb::ALL,
        fields: &[
            field("name", "name", "string", true, "Record name relative to the zone"),
            field("type", "type", "string", true, "A, AAAA, CNAME, MX, TXT, ..."),
            field("content", "content", "string", true, "Record content"),
            field("ttl", "ttl", "integer", false, "Time to live in seconds"),
            field("priority", "priority", "integer", false, "Priority (MX, SRV)"),
            field("enabled", "enabled", "boolean", false, "Serve the record"),
        ],
        update: UpdateStyle::PutEnvelope,
        children: &[],
    }],
}];

const POSTGRES: &[Resource] = &[Resource {
    name: "cluster",
    about: "PostgreSQL clusters",
    id_flag: Some("cluster-id"),
    collection: Some("/databases/postgresql/clusters"),
    verbs: Verb::ALL,
    fields: &[
        field("name", "displayName", "string", true, "Cluster display name"),
        field("postgres-version", "postgresVersion", "string", true, "PostgreSQL major version"),
        field("instances", "instances", "integer", true, "Number of instances"),
        field("cores", "cores", "integer", true, "CPU cores per instance"),
        field("ram", "ram", "integer", true, "Memory per instance in MB"),
        field("storage-size", "storageSize", "integer", true, "Storage per instance in MB"),
        field("location", "location", "string", true, "Physical location, e.g. de/fra"),
    ],
    update: UpdateStyle::PatchEnvelope,
    children: &[],
}];

const DBAAS: &[Resource] = &[namespace("postgres", "Managed PostgreSQL", POSTGRES)];

pub static CATALOG: &[Resource] = &[
    Resource {
        name: "datacenter",
        about: "Compute virtual data centers",
        id_flag: Some("datacenter-id"),
        collection: Some("/cloudapi/v6/datacenters"),
        verbs: Verb::ALL,
        fields: &[
            field("name", "name", "string", true, "Data center name"),
            field("location", "location", "string", true, "Physical location, e.g. de/fra"),
            field("description", "description", "string", false, "Free-form description"),
        ],
        update: UpdateStyle::PatchProperties,
        children: &[
            Resource {
                name: "server",
                about: "Servers inside a data center",
                id_flag: Some("server-id"),
                collection: Some("/cloudapi/v6/datacenters/{datacenter-id}/servers"),
                verbs: Verb::ALL,
                fields: &[
                    field("name", "name", "string", true, "Server name"),
                    field("cores", "cores", "integer", true, "Number of CPU cores"),
                    field("ram", "ram", "integer", true, "Memory in MB"),
                    field("availability-zone", "availabilityZone", "string", false, "AUTO, ZONE_1 or ZONE_2"),
                    field("cpu-family", "cpuFamily", "string", false, "CPU architecture"),
                ],
                update: UpdateStyle::PatchProperties,
                children: &[Resource {
                    name: "nic",
                    about: "Network interfaces attached to a server",
                    id_flag: Some("nic-id"),
                    collection: Some(
                        "/cloudapi/v6/datacenters/{datacenter-id}/servers/{server-id}/nics",
                    ),
                    verbs: Verb::ALL,
                    fields: &[
                        field("name", "name", "string", false, "NIC name"),
                        field("lan", "lan", "integer", true, "LAN the NIC is attached to"),
                        field("dhcp", "dhcp", "boolean", false, "Enable DHCP"),
                        field("ips", "ips", "array", false, "Comma-separated IP addresses"),
                    ],
                    update: UpdateStyle::PatchProperties,
                    children: &[],
                }],
            },
            Resource {
                name: "volume",
                about: "Block storage volumes inside a data center",
                id_flag: Some("volume-id"),
                collection: Some("/cloudapi/v6/datacenters/{datacenter-id}/volumes"),
                verbs: Verb::ALL,
                fields: &[
                    field("name", "name", "string", true, "Volume name"),
                    field("size", "size", "number", true, "Size in GB"),
                    field("type", "type", "string", true, "HDD, SSD Standard or SSD Premium"),
                    field("image-alias", "imageAlias", "string", false, "Image alias to provision from"),
                    field("availability-zone", "availabilityZone", "string", false, "AUTO, ZONE_1, ZONE_2 or ZONE_3"),
                ],
                update: UpdateStyle::PatchProperties,
                children: &[],
            },
            Resource {
                name: "lan",
                about: "LANs inside a data center",
                id_flag: Some("lan-id"),
                collection: Some("/cloudapi/v6/datacenters/{datacenter-id}/lans"),
                verbs: Verb::ALL,
                fields: &[
                    field("name", "name", "string", false, "LAN name"),
                    field("public", "public", "boolean", false, "Public LAN"),
                ],
                update: UpdateStyle::PatchProperties,
                children: &[],
            },
        ],
    },
    namespace("dns", "Cloud DNS", DNS),
    namespace("dbaas", "Database as a service", DBAAS),
    Resource {
        name: "container-registry",
        about: "Private container registries",
        id_flag: Some("registry-id"),
        collection: Some("/containerregistries/registries"),
        verbs: Verb::ALL,
        fields: &[
            field("name", "name", "string", true, "Registry name"),
            field("location", "location", "string", true, "Physical location, e.g. de/fra"),
        ],
        update: UpdateStyle::PatchEnvelope,
        children: &[],
    },
    Resource {
        name: "certificate",
        about: "TLS certificates",
        id_flag: Some("certificate-id"),
        collection: Some("/certificatemanager/certificates"),
        verbs: Verb::ALL,
        fields: &[
            field("name", "name", "string", true, "Certificate name"),
            field("certificate", "certificate", "string", true, "PEM encoded certificate"),
            field("certificate-chain", "certificateChain", "string", false, "PEM encoded chain"),
            field("private-key", "privateKey", "string", true, "PEM encoded private key"),
        ],
        update: UpdateStyle::PatchEnvelope,
        children: &[],
    },
];
